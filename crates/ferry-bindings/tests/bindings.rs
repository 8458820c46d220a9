//! Bindings used through the object protocol.

use std::sync::Arc;

use ferry_bindings::config::{ConfigObject, PropertyFile};
use ferry_bindings::dependency::{Dependency, dependency_binding};
use ferry_bindings::network::{self, network_binding};
use ferry_core::{List, Object, ObjectExt, Value};
use serial_test::serial;
use tempfile::tempdir;

#[test]
fn test_property_file_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("app.properties");

    let mut file = PropertyFile::parse("# app\napp.name = Demo\napp.window.width: 800\n");
    file.set("app.version", "1.0");
    file.save(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        text,
        "app.name: Demo\napp.version: 1.0\napp.window.width: 800\n"
    );
    assert_eq!(PropertyFile::load(&path).unwrap(), file);
}

#[test]
fn test_load_missing_file_is_io_error() {
    let dir = tempdir().unwrap();
    let err = PropertyFile::load(dir.path().join("absent.properties")).unwrap_err();
    assert_eq!(err.kind(), "IOError");
}

#[test]
fn test_config_object_edits_persist() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.properties");
    std::fs::write(&path, "ui.theme=dark\nui.font.size=12\n").unwrap();

    let config = ConfigObject::load(&path).unwrap();
    assert_eq!(config.get_ns("ui.font.size").unwrap(), Value::string("12"));
    config.set_ns("ui.font.size", Value::int(14)).unwrap();
    let err = config.set_ns("net.proxy.host", Value::string("x")).unwrap_err();
    assert_eq!(err.kind(), "MissingIntermediate");
    config.save(&path).unwrap();

    let reloaded = ConfigObject::load(&path).unwrap();
    assert_eq!(reloaded.get_ns("ui.font.size").unwrap(), Value::string("14"));
    assert_eq!(reloaded.get_ns("ui.theme").unwrap(), Value::string("dark"));
}

#[test]
fn test_resolved_path_is_getter_only() {
    let dep = Arc::new(Dependency::from_manifest_line("sdk", "1.0.0"));
    dep.resolve("/usr/lib/sdk/1.0.0", "1.0.0").unwrap();
    let binding = dependency_binding(dep);

    let err = binding
        .set("resolvedPath", Value::string("/tmp/elsewhere"))
        .unwrap_err();
    assert_eq!(err.kind(), "PropertyRejected");
    assert_eq!(
        binding.get("resolvedPath").unwrap(),
        Value::string("/usr/lib/sdk/1.0.0")
    );
    assert_eq!(binding.get("version").unwrap(), Value::string("1.0.0"));
}

#[test]
#[serial]
fn test_proxy_overrides_through_binding() {
    let net = network_binding();

    net.call_ns(
        "setHTTPProxy",
        &[
            Value::string("proxy.corp:3128"),
            Value::string("localhost"),
            Value::string("ana"),
            Value::string("pw"),
        ],
    )
    .unwrap();
    assert_eq!(
        net.call_ns("getHTTPProxy", &[]).unwrap(),
        Value::string("http://ana:pw@proxy.corp:3128")
    );
    assert_eq!(
        net.call_ns("getProxy", &[]).unwrap(),
        net.call_ns("getHTTPProxy", &[]).unwrap()
    );
    let proxy = network::http_proxy_override().unwrap();
    assert!(proxy.bypasses("localhost"));

    net.call_ns("setHTTPSProxy", &[Value::string("secure.corp")])
        .unwrap();
    assert_eq!(
        net.call_ns("getHTTPSProxy", &[]).unwrap(),
        Value::string("https://secure.corp:443")
    );

    net.call_ns("setHTTPProxy", &[Value::Null]).unwrap();
    net.call_ns("setHTTPSProxy", &[Value::string("")]).unwrap();
    assert!(net.call_ns("getHTTPProxy", &[]).unwrap().is_null());
    assert!(net.call_ns("getHTTPSProxy", &[]).unwrap().is_null());
}

#[test]
#[serial]
fn test_proxy_arguments_are_verified() {
    let net = network_binding();
    let err = net
        .call_ns("setHTTPProxy", &[Value::int(8080)])
        .unwrap_err();
    assert_eq!(err.kind(), "InvalidArguments");
    let err = net.call_ns("setHTTPProxy", &[]).unwrap_err();
    assert_eq!(err.kind(), "InvalidArguments");
    assert!(network::http_proxy_override().is_none());
}

#[test]
fn test_network_binding_reads_interface_cache() {
    let net = network_binding();

    let interfaces = net.call_ns("getInterfaces", &[]).unwrap();
    let interfaces = interfaces.as_list().unwrap();
    assert_eq!(interfaces.size(), network::interfaces().len());
    for index in 0..interfaces.size() {
        let item = interfaces.at(index).unwrap();
        assert_eq!(item.as_object().unwrap().type_name(), "Network.Interface");
    }
    assert_eq!(net.get("interfaces").unwrap(), Value::List(interfaces.clone()));

    let first = net.call_ns("getFirstIPAddress", &[]).unwrap();
    assert!(first.to_str().unwrap().parse::<std::net::Ipv4Addr>().is_ok());
}

#[test]
fn test_create_ip_address() {
    let net = network_binding();
    let addr = net
        .call_ns("createIPAddress", &[Value::string("::1")])
        .unwrap();
    let addr = addr.as_object().unwrap();
    assert_eq!(addr.call_ns("isIPv6", &[]).unwrap(), Value::bool(true));
    assert_eq!(addr.call_ns("isLoopback", &[]).unwrap(), Value::bool(true));
    assert_eq!(addr.call_ns("toString", &[]).unwrap(), Value::string("::1"));

    let err = net
        .call_ns("createIPAddress", &[Value::string("not-an-ip")])
        .unwrap_err();
    assert_eq!(err.message(), "Invalid address: not-an-ip");
}
