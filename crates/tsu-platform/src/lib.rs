//! # tsu-platform
//!
//! Trust store backends and the registry that builds them from config.
//!
//! | platform | kind | targets |
//! |---|---|---|
//! | linux | system | `ca-certificates`, `update-ca-trust` |
//! | darwin | system | `system-keychain`, `login-keychain` |
//! | windows | system | `root`, `ca`, `my`, `trust` |
//! | any | application | `docker`, `pem-directory`, `java-cacerts` |

pub mod anchor_dir;
pub mod bundle;
pub mod certutil;
pub mod command;
pub mod java;
pub mod keychain;
pub mod registry;

pub use anchor_dir::AnchorDirStore;
pub use certutil::WindowsStore;
pub use java::JavaCacertsStore;
pub use keychain::KeychainStore;
pub use registry::{BackendRegistry, Constructor};
