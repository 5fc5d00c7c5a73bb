use std::{convert::Infallible, str::FromStr};

/// Where the produced executable is meant to run.
#[allow(non_camel_case_types)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    x86_64_linux,
    x86_64_darwin,
    aarch64_linux,
    aarch64_darwin,
    /// Any other triple, handed to the backend as is.
    Custom(String),
}

impl Target {
    pub const KNOWN: &[Target] = &[
        Target::x86_64_linux,
        Target::x86_64_darwin,
        Target::aarch64_linux,
        Target::aarch64_darwin,
    ];

    pub fn triple(&self) -> &str {
        match self {
            Target::x86_64_linux => "x86_64-unknown-linux-gnu",
            Target::x86_64_darwin => "x86_64-apple-darwin",
            Target::aarch64_linux => "aarch64-unknown-linux-gnu",
            Target::aarch64_darwin => "aarch64-apple-darwin",
            Target::Custom(triple) => triple,
        }
    }

    /// The target of the machine running the compiler.
    pub fn host() -> Target {
        cfg_if::cfg_if! {
            if #[cfg(all(target_arch = "aarch64", target_os = "macos"))] {
                Target::aarch64_darwin
            } else if #[cfg(target_os = "macos")] {
                Target::x86_64_darwin
            } else if #[cfg(target_arch = "aarch64")] {
                Target::aarch64_linux
            } else {
                Target::x86_64_linux
            }
        }
    }
}

impl Default for Target {
    fn default() -> Target {
        Target::host()
    }
}

impl FromStr for Target {
    type Err = Infallible;

    fn from_str(triple: &str) -> Result<Target, Infallible> {
        let known = Target::KNOWN.iter().find(|t| t.triple() == triple);
        Ok(known
            .cloned()
            .unwrap_or_else(|| Target::Custom(triple.to_owned())))
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.triple())
    }
}

/// Everything the library needs to know about a compilation besides the
/// source text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileOptions {
    pub target: Target,
    /// Whether standard library names resolve. When off, calls to them are
    /// unknown functions.
    pub stdlib: bool,
}

impl Default for CompileOptions {
    fn default() -> CompileOptions {
        CompileOptions {
            target: Target::default(),
            stdlib: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triples_round_trip() {
        for target in Target::KNOWN {
            assert_eq!(&target.triple().parse::<Target>().unwrap(), target);
        }
        assert_eq!(
            "riscv64gc-unknown-linux-gnu".parse::<Target>().unwrap(),
            Target::Custom("riscv64gc-unknown-linux-gnu".into())
        );
    }
}
