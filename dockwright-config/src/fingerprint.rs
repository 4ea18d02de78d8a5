//! Stable identities for connection configurations.

use crate::connection::Config;

/// The delimiter placed between fields before hashing.
const DELIMITER: &str = "|";

/// The FNV-1a 64-bit offset basis.
const FNV_OFFSET: u64 = 0xcbf29ce484222325;

/// The FNV-1a 64-bit prime.
const FNV_PRIME: u64 = 0x100000001b3;

/// A deterministic identity derived from every field of a [`Config`].
///
/// The SSH options are sorted before hashing, so two configurations that only
/// differ in the order of their SSH options share a fingerprint. Every other
/// field is compared byte for byte. The hash is unseeded, so a fingerprint is
/// stable across processes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Gets the raw value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Config {
    /// Computes the [`Fingerprint`] of the configuration.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut ssh_opts = self.ssh_opts().to_vec();
        ssh_opts.sort();

        let joined = [
            self.host(),
            self.ca(),
            self.cert(),
            self.key(),
            self.cert_path(),
            &ssh_opts.join(DELIMITER),
        ]
        .join(DELIMITER);

        Fingerprint(fnv1a(joined.as_bytes()))
    }
}

/// Hashes `bytes` with 64-bit FNV-1a.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn fnv1a_matches_reference_vectors() {
        assert_eq!(fnv1a(b""), 0xcbf29ce484222325);
        assert_eq!(fnv1a(b"a"), 0xaf63dc4c8601ec8c);
        assert_eq!(fnv1a(b"foobar"), 0x85944171f73967e8);
    }

    #[test]
    fn ssh_option_order_is_ignored() {
        let a = Config::builder()
            .host("ssh://user@h")
            .ssh_opts(opts(&["-o", "StrictHostKeyChecking=no"]))
            .build();
        let b = Config::builder()
            .host("ssh://user@h")
            .ssh_opts(opts(&["StrictHostKeyChecking=no", "-o"]))
            .build();

        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn ssh_options_contribute() {
        let a = Config::builder().host("ssh://user@h").build();
        let b = Config::builder()
            .host("ssh://user@h")
            .ssh_opts(opts(&["-4"]))
            .build();

        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let config = Config::builder()
            .host("tcp://d:2376")
            .ca("CA")
            .cert("CERT")
            .key("KEY")
            .build();

        assert_eq!(config.fingerprint(), config.clone().fingerprint());
        assert_eq!(
            Config::default().fingerprint().get(),
            fnv1a(b"|||||"),
            "an empty configuration hashes its delimiters only"
        );
    }

    #[test]
    fn every_field_changes_the_fingerprint() {
        let base = Config::builder()
            .host("tcp://d:2376")
            .ca("CA")
            .cert("CERT")
            .key("KEY")
            .cert_path("/certs")
            .build();

        let variants = [
            Config::builder()
                .host("tcp://e:2376")
                .ca("CA")
                .cert("CERT")
                .key("KEY")
                .cert_path("/certs")
                .build(),
            Config::builder()
                .host("tcp://d:2376")
                .ca("CA2")
                .cert("CERT")
                .key("KEY")
                .cert_path("/certs")
                .build(),
            Config::builder()
                .host("tcp://d:2376")
                .ca("CA")
                .cert("CERT2")
                .key("KEY")
                .cert_path("/certs")
                .build(),
            Config::builder()
                .host("tcp://d:2376")
                .ca("CA")
                .cert("CERT")
                .key("KEY2")
                .cert_path("/certs")
                .build(),
            Config::builder()
                .host("tcp://d:2376")
                .ca("CA")
                .cert("CERT")
                .key("KEY")
                .cert_path("/other")
                .build(),
        ];

        for variant in &variants {
            assert_ne!(base.fingerprint(), variant.fingerprint(), "{variant:?}");
        }
    }
}
