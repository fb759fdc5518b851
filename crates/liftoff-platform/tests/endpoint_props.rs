use liftoff_platform::resolve_target;
use liftoff_types::{Scheme, TargetSpec};
use proptest::prelude::*;

fn host_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,12}(\\.[a-z][a-z0-9-]{0,12}){0,3}"
}

proptest! {
    #[test]
    fn test_bare_hosts_resolve_to_https_without_port(host in host_strategy()) {
        let endpoint = resolve_target(&TargetSpec::new(host.clone())).unwrap();
        prop_assert_eq!(endpoint.scheme, Scheme::Https);
        prop_assert_eq!(endpoint.port, None);
        prop_assert_eq!(endpoint.secure, None);
        prop_assert_eq!(endpoint.host, host);
    }

    #[test]
    fn test_explicit_port_survives_any_scheme(
        host in host_strategy(),
        port in 1u16..=u16::MAX,
        scheme in prop::sample::select(vec!["", "http://", "https://"]),
    ) {
        let raw = format!("{}{}:{}", scheme, host, port);
        let endpoint = resolve_target(&TargetSpec::new(raw)).unwrap();
        prop_assert_eq!(endpoint.port, Some(port));
    }

    #[test]
    fn test_paths_never_leak_into_host(host in host_strategy(), path in "/[a-z0-9/]{1,20}") {
        let endpoint = resolve_target(&TargetSpec::new(format!("https://{}{}", host, path))).unwrap();
        prop_assert_eq!(endpoint.host, host);
        prop_assert_eq!(endpoint.discarded_path, Some(path));
    }
}
