//! Command-line configuration.
//!
//! There are no configuration files and no reload support: the proxy's
//! entire surface is the two flags below, parsed once at startup.

use clap::Parser;

/// Default listening port, matching the upstream `unatd` proxy this crate
/// reimplements.
pub const DEFAULT_PORT: u16 = 2002;

/// Backlog passed to `listen()` on the transparent listening socket.
pub const LISTEN_BACKLOG: i32 = 1024;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tproxyd",
    about = "A transparent TCP proxy",
    disable_help_subcommand = true
)]
pub struct Args {
    /// Listening TCP port.
    #[arg(short = 'p', long = "port", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Enable SNAT mode: originate upstream connections from the IPv4
    /// address of this interface instead of the client's own address.
    #[arg(short = 'n', long = "snat-iface", value_name = "IFACE")]
    pub snat_iface: Option<String>,
}

impl Args {
    /// Parses `argv`, printing a diagnostic and returning an error for
    /// unknown flags or superfluous positional arguments rather than
    /// letting `clap`'s default usage-error exit code (2) leak through --
    /// the external contract for this proxy is exit code 1.
    pub fn parse_or_exit() -> Result<Args, String> {
        Args::try_parse().map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port() {
        let args = Args::try_parse_from(["tproxyd"]).unwrap();
        assert_eq!(args.port, DEFAULT_PORT);
        assert!(args.snat_iface.is_none());
    }

    #[test]
    fn explicit_port_and_snat() {
        let args = Args::try_parse_from(["tproxyd", "-p", "4321", "-n", "eth1"]).unwrap();
        assert_eq!(args.port, 4321);
        assert_eq!(args.snat_iface.as_deref(), Some("eth1"));
    }

    #[test]
    fn unknown_flag_is_an_error() {
        assert!(Args::try_parse_from(["tproxyd", "--bogus"]).is_err());
    }

    #[test]
    fn superfluous_positional_is_an_error() {
        assert!(Args::try_parse_from(["tproxyd", "extra"]).is_err());
    }
}
