//! Network information and proxy overrides
//!
//! The interface list is read from the operating system once per process and
//! cached. Proxy overrides are process-wide and replace whatever proxy the
//! application would otherwise detect.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, OnceLock};

use ferry_core::{
    AccessorObject, ArgList, BridgeError, BridgeResult, ListRef, StaticBoundList,
    StaticBoundObject, Value,
};
use parking_lot::RwLock;
use serde::Serialize;
use sysinfo::Networks;
use tracing::{debug, info};
use url::Url;

/// One address assigned to an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InterfaceAddress {
    pub addr: IpAddr,
    pub prefix: u8,
}

impl InterfaceAddress {
    /// Netmask derived from the prefix length
    pub fn netmask(&self) -> IpAddr {
        match self.addr {
            IpAddr::V4(_) => {
                let bits = u32::MAX.checked_shl(32 - u32::from(self.prefix.min(32))).unwrap_or(0);
                IpAddr::V4(Ipv4Addr::from(bits))
            }
            IpAddr::V6(_) => {
                let bits = u128::MAX
                    .checked_shl(128 - u32::from(self.prefix.min(128)))
                    .unwrap_or(0);
                IpAddr::V6(Ipv6Addr::from(bits))
            }
        }
    }
}

/// A network interface as reported by the operating system
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interface {
    pub name: String,
    pub mac_address: String,
    pub addresses: Vec<InterfaceAddress>,
}

impl Interface {
    pub fn first_address(&self) -> Option<InterfaceAddress> {
        self.addresses
            .iter()
            .find(|a| a.addr.is_ipv4())
            .or_else(|| self.addresses.first())
            .copied()
    }

    pub fn supports_ipv4(&self) -> bool {
        self.addresses.iter().any(|a| a.addr.is_ipv4())
    }

    pub fn supports_ipv6(&self) -> bool {
        self.addresses.iter().any(|a| a.addr.is_ipv6())
    }

    pub fn is_loopback(&self) -> bool {
        !self.addresses.is_empty() && self.addresses.iter().all(|a| a.addr.is_loopback())
    }
}

fn scan_interfaces() -> Vec<Interface> {
    let networks = Networks::new_with_refreshed_list();
    let mut interfaces: Vec<Interface> = networks
        .list()
        .iter()
        .map(|(name, data)| Interface {
            name: name.clone(),
            mac_address: data.mac_address().to_string(),
            addresses: data
                .ip_networks()
                .iter()
                .map(|net| InterfaceAddress {
                    addr: net.addr,
                    prefix: net.prefix,
                })
                .collect(),
        })
        .collect();
    interfaces.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(count = interfaces.len(), "network interfaces scanned");
    interfaces
}

/// Interfaces of this machine, scanned on first use
pub fn interfaces() -> &'static [Interface] {
    static INTERFACES: OnceLock<Vec<Interface>> = OnceLock::new();
    INTERFACES.get_or_init(scan_interfaces)
}

/// First non-loopback IPv4 address among `interfaces`
pub fn first_ipv4_in(interfaces: &[Interface]) -> Option<Ipv4Addr> {
    interfaces
        .iter()
        .flat_map(|i| &i.addresses)
        .find_map(|a| match a.addr {
            IpAddr::V4(v4) if !v4.is_loopback() => Some(v4),
            _ => None,
        })
}

/// First non-loopback IPv4 address, or `127.0.0.1` when there is none
pub fn first_ipv4_address() -> Ipv4Addr {
    first_ipv4_in(interfaces()).unwrap_or(Ipv4Addr::LOCALHOST)
}

/// First hardware address that is not all zeroes
pub fn first_mac_in(interfaces: &[Interface]) -> Option<&str> {
    interfaces
        .iter()
        .map(|i| i.mac_address.as_str())
        .find(|mac| mac.chars().any(|c| c.is_ascii_hexdigit() && c != '0'))
}

pub fn first_mac_address() -> String {
    first_mac_in(interfaces())
        .unwrap_or("00:00:00:00:00:00")
        .to_string()
}

/// A proxy server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proxy {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub bypass: Vec<String>,
}

impl Proxy {
    /// Parse a proxy entry
    ///
    /// Accepts full URLs (`http://user:pw@host:8080`), bare `host:port`
    /// pairs which take `default_scheme`, and the `scheme=host:port` form used
    /// by system proxy lists.
    pub fn parse(entry: &str, default_scheme: &str) -> BridgeResult<Self> {
        let entry = entry.trim();
        let (scheme, rest) = match entry.split_once('=') {
            Some((scheme, rest)) if !scheme.contains("://") && !scheme.is_empty() => {
                (scheme.trim(), rest.trim())
            }
            _ => (default_scheme, entry),
        };
        let text = if rest.contains("://") {
            rest.to_string()
        } else {
            format!("{scheme}://{rest}")
        };
        let url = Url::parse(&text)
            .map_err(|e| BridgeError::native(format!("Invalid proxy '{entry}': {e}")))?;
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| BridgeError::native(format!("Proxy '{entry}' has no host")))?;

        Ok(Self {
            scheme: url.scheme().to_string(),
            host: host.to_string(),
            port: url.port_or_known_default(),
            username: Some(url.username())
                .filter(|u| !u.is_empty())
                .map(String::from),
            password: url.password().map(String::from),
            bypass: Vec::new(),
        })
    }

    /// Comma or semicolon separated hosts that skip the proxy
    pub fn with_bypass(mut self, list: &str) -> Self {
        self.bypass = list
            .split([',', ';'])
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(String::from)
            .collect();
        self
    }

    pub fn with_credentials(mut self, username: Option<&str>, password: Option<&str>) -> Self {
        if let Some(username) = username.filter(|u| !u.is_empty()) {
            self.username = Some(username.to_string());
        }
        if let Some(password) = password.filter(|p| !p.is_empty()) {
            self.password = Some(password.to_string());
        }
        self
    }

    /// Whether requests to `host` go direct
    pub fn bypasses(&self, host: &str) -> bool {
        self.bypass.iter().any(|pattern| match pattern.strip_prefix('*') {
            Some(suffix) => host.to_ascii_lowercase().ends_with(&suffix.to_ascii_lowercase()),
            None => pattern.eq_ignore_ascii_case(host),
        })
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", self.scheme)?;
        if let Some(username) = &self.username {
            f.write_str(username)?;
            if let Some(password) = &self.password {
                write!(f, ":{password}")?;
            }
            f.write_str("@")?;
        }
        f.write_str(&self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        Ok(())
    }
}

static HTTP_PROXY: RwLock<Option<Proxy>> = RwLock::new(None);
static HTTPS_PROXY: RwLock<Option<Proxy>> = RwLock::new(None);

pub fn set_http_proxy_override(proxy: Option<Proxy>) {
    info!(proxy = ?proxy.as_ref().map(ToString::to_string), "HTTP proxy override");
    *HTTP_PROXY.write() = proxy;
}

pub fn http_proxy_override() -> Option<Proxy> {
    HTTP_PROXY.read().clone()
}

pub fn set_https_proxy_override(proxy: Option<Proxy>) {
    info!(proxy = ?proxy.as_ref().map(ToString::to_string), "HTTPS proxy override");
    *HTTPS_PROXY.write() = proxy;
}

pub fn https_proxy_override() -> Option<Proxy> {
    HTTPS_PROXY.read().clone()
}

/// Proxy described by `setHTTPProxy`-style arguments; `None` clears
fn proxy_from_args(method: &str, args: &[Value], scheme: &str) -> BridgeResult<Option<Proxy>> {
    args.verify(method, "s|0 ?s s s")?;
    let Some(entry) = args.opt_str_arg(0)?.filter(|e| !e.is_empty()) else {
        return Ok(None);
    };
    let mut proxy = Proxy::parse(entry, scheme)?;
    if let Some(bypass) = args.opt_str_arg(1)? {
        proxy = proxy.with_bypass(bypass);
    }
    Ok(Some(
        proxy.with_credentials(args.opt_str_arg(2)?, args.opt_str_arg(3)?),
    ))
}

fn proxy_value(proxy: Option<Proxy>) -> Value {
    proxy.map_or(Value::Null, |p| Value::string(p.to_string()))
}

/// Script view of an IP address
pub fn ip_address_binding(addr: IpAddr) -> StaticBoundObject {
    StaticBoundObject::new("Network.IPAddress")
        .with_method("toString", move |_| Ok(Value::string(addr.to_string())))
        .with_method("isIPv4", move |_| Ok(Value::bool(addr.is_ipv4())))
        .with_method("isIPv6", move |_| Ok(Value::bool(addr.is_ipv6())))
        .with_method("isLoopback", move |_| Ok(Value::bool(addr.is_loopback())))
        .with_method("isUnspecified", move |_| Ok(Value::bool(addr.is_unspecified())))
}

fn ip_address_value(addr: IpAddr) -> Value {
    Value::Object(Arc::new(ip_address_binding(addr)))
}

/// Script view of one interface
pub fn interface_binding(interface: Interface) -> StaticBoundObject {
    let first = interface.first_address();
    let address = move || {
        first.map_or(Value::Null, |a| Value::string(a.addr.to_string()))
    };
    let ip_address = move || first.map_or(Value::Null, |a| ip_address_value(a.addr));
    let subnet_mask = move || first.map_or(Value::Null, |a| ip_address_value(a.netmask()));

    let name = interface.name.clone();
    let display_name = interface.name.clone();
    let mac = interface.mac_address.clone();
    let v4 = interface.supports_ipv4();
    let v6 = interface.supports_ipv6();

    StaticBoundObject::new("Network.Interface")
        .with_method("getAddress", move |_| Ok(address()))
        .with_method("getIPAddress", move |_| Ok(ip_address()))
        .with_method("getName", move |_| Ok(Value::string(name.as_str())))
        .with_method("getDisplayName", move |_| {
            Ok(Value::string(display_name.as_str()))
        })
        .with_method("getSubnetMask", move |_| Ok(subnet_mask()))
        .with_method("getMACAddress", move |_| Ok(Value::string(mac.as_str())))
        .with_method("supportsIPv4", move |_| Ok(Value::bool(v4)))
        .with_method("supportsIPv6", move |_| Ok(Value::bool(v6)))
}

/// Bindings for a fixed interface list
pub fn interface_list(interfaces: &[Interface]) -> ListRef {
    let items = interfaces
        .iter()
        .cloned()
        .map(|i| Value::Object(Arc::new(interface_binding(i))))
        .collect();
    Arc::new(StaticBoundList::from_values(items))
}

fn cached_interface_list() -> ListRef {
    static LIST: OnceLock<ListRef> = OnceLock::new();
    LIST.get_or_init(|| interface_list(interfaces())).clone()
}

/// The `Network` object exposed to scripts
pub fn network_binding() -> AccessorObject {
    let binding = AccessorObject::new("Network")
        .with_method("getInterfaces", |_| Ok(Value::List(cached_interface_list())))
        .with_method("getFirstIPAddress", |_| {
            Ok(Value::string(first_ipv4_address().to_string()))
        })
        .with_method("getAddress", |_| {
            Ok(Value::string(first_ipv4_address().to_string()))
        })
        .with_method("getFirstMACAddress", |_| Ok(Value::string(first_mac_address())))
        .with_method("getMACAddress", |_| Ok(Value::string(first_mac_address())))
        .with_method("createIPAddress", |args| {
            args.verify("createIPAddress", "s")?;
            let text = args.str_arg(0)?;
            let addr: IpAddr = text
                .trim()
                .parse()
                .map_err(|_| BridgeError::native(format!("Invalid address: {text}")))?;
            Ok(ip_address_value(addr))
        })
        .with_method("setHTTPProxy", |args| {
            set_http_proxy_override(proxy_from_args("setHTTPProxy", args, "http")?);
            Ok(Value::Undefined)
        })
        .with_method("setProxy", |args| {
            set_http_proxy_override(proxy_from_args("setProxy", args, "http")?);
            Ok(Value::Undefined)
        })
        .with_method("getHTTPProxy", |_| Ok(proxy_value(http_proxy_override())))
        .with_method("getProxy", |_| Ok(proxy_value(http_proxy_override())))
        .with_method("setHTTPSProxy", |args| {
            set_https_proxy_override(proxy_from_args("setHTTPSProxy", args, "https")?);
            Ok(Value::Undefined)
        })
        .with_method("getHTTPSProxy", |_| Ok(proxy_value(https_proxy_override())));

    binding.define_getter("interfaces", || Ok(Value::List(cached_interface_list())));
    binding
}
