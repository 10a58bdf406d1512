mod auth;
mod browse;
mod dashboard;
mod heatmap;
mod helpers;

pub(crate) use auth::{cmd_login, cmd_logout, cmd_whoami};
pub(crate) use browse::cmd_browse;
pub(crate) use dashboard::{cmd_dashboard, cmd_toggle};
pub(crate) use heatmap::cmd_heatmap;
pub(crate) use helpers::SyncArgs;
