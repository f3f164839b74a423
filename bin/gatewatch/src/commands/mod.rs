pub mod config_cmd;
pub mod dispatch;
pub mod simulate;
pub mod status;
