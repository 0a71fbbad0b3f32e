//! Installer flavours shipped in the VeraCrypt setup tarball.

use std::fmt;
use std::str::FromStr;

use crate::error::PackError;

/// Which installer flavour to repackage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildVariant {
    /// wxWidgets GUI on GTK3.
    #[default]
    Gui,
    /// wxWidgets GUI on legacy GTK2.
    Gtk2Gui,
    /// Text-mode only.
    Console,
}

impl BuildVariant {
    pub const ALL: [BuildVariant; 3] = [
        BuildVariant::Gui,
        BuildVariant::Gtk2Gui,
        BuildVariant::Console,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BuildVariant::Gui => "gui",
            BuildVariant::Gtk2Gui => "gtk2-gui",
            BuildVariant::Console => "console",
        }
    }

    /// File name of the self-extracting installer inside the setup tarball,
    /// e.g. `veracrypt-1.26.24-setup-console-x64`.
    pub fn installer_name(self, version: &str) -> String {
        format!("veracrypt-{version}-setup-{}-x64", self.as_str())
    }
}

impl fmt::Display for BuildVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildVariant {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuildVariant::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| {
                PackError::InvalidArgument(format!(
                    "unsupported type '{}'; expected one of: gui, gtk2-gui, console",
                    s
                ))
            })
    }
}
