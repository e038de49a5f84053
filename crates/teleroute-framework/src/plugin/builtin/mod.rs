//! Built-in plugins, enabled by the `builtin-plugins` feature.
//!
//! | Plugin | Name | Description |
//! |--------|------|-------------|
//! | [`LoggingPlugin`] | `"teleroute.logging"` | Logs every update before any other group runs |

mod logging;

pub use logging::LoggingPlugin;
