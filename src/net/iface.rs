//! Interface address lookup for SNAT mode.
//!
//! When `--snat-iface` is given, egress connections originate from that
//! interface's IPv4 address instead of the client's own address. The
//! original proxy resolved this with `ioctl(SIOCGIFADDR)`; `getifaddrs` is
//! the modern portable equivalent and avoids an ioctl call keyed to a
//! specific socket family.

use std::ffi::CStr;
use std::io;
use std::net::Ipv4Addr;

/// Looks up the IPv4 address assigned to `iface` (e.g. `"eth0"`).
pub fn ipv4_addr_of(iface: &str) -> io::Result<Ipv4Addr> {
    let mut ifap: *mut libc::ifaddrs = std::ptr::null_mut();
    if unsafe { libc::getifaddrs(&mut ifap) } != 0 {
        return Err(io::Error::last_os_error());
    }

    let result = find_ipv4(ifap, iface);
    unsafe { libc::freeifaddrs(ifap) };

    result.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no IPv4 address found on interface {iface:?}"),
        )
    })
}

fn find_ipv4(ifap: *mut libc::ifaddrs, iface: &str) -> Option<Ipv4Addr> {
    let mut cur = ifap;
    while !cur.is_null() {
        let entry = unsafe { &*cur };
        cur = entry.ifa_next;

        if entry.ifa_addr.is_null() {
            continue;
        }
        let name = unsafe { CStr::from_ptr(entry.ifa_name) };
        if name.to_str() != Ok(iface) {
            continue;
        }

        let family = unsafe { (*entry.ifa_addr).sa_family };
        if family as i32 != libc::AF_INET {
            continue;
        }

        let sin = entry.ifa_addr as *const libc::sockaddr_in;
        let s_addr = unsafe { (*sin).sin_addr.s_addr };
        return Some(Ipv4Addr::from(u32::from_be(s_addr)));
    }
    None
}
