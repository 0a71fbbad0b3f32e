//! Repackage the official VeraCrypt Linux installer as an AppImage.
//!
//! The upstream release ships a bzip2 tarball holding makeself
//! self-extracting installers, one per flavour. Each installer unpacks to a
//! shell script that carries the real payload, a tarball appended after a
//! `PACKAGE_START=<line>` marker. This crate peels those layers without
//! running the installer and wraps the payload in an AppDir.
//!
//! # Pipeline
//!
//! ```text
//! resolve ── release API tag → "1.26.24"
//!    │
//! fetch ──── setup tarball + sha512sum manifest
//!    │
//! verify ─── SHA-512 against the manifest line for the tarball
//!    │
//! extract ── tarball → installer → install script → payload.tar → AppDir
//!    │
//! assemble ─ icon, .desktop, AppRun
//!    │
//! package ── appimagetool → Veracrypt-<version>-<type>-x86_64
//! ```
//!
//! Anything that reaches the network or spawns an external tool sits
//! behind a trait ([`fetch::Transport`], [`checksum::DigestProvider`],
//! [`extract::ArchiveCodec`], [`extract::SelfExtractor`],
//! [`package::PackagingTool`]) and is handed to [`pipeline::run`] in a
//! [`pipeline::BuildContext`].

pub mod bundle;
pub mod checksum;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod filesystem;
pub mod package;
pub mod pipeline;
pub mod preflight;
pub mod process;
pub mod resolve;
pub mod variant;

pub use config::{Config, Options};
pub use error::{PackError, Result};
pub use pipeline::{BuildContext, BuildOutcome};
pub use variant::BuildVariant;
