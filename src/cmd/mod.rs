//! CLI command implementations.
//!
//! | Module    | Commands handled |
//! |-----------|------------------|
//! | `run`     | `Run`            |
//! | `phases`  | `Phases`         |
//! | `config`  | `Config`         |
//! | `report`  | `Report`         |

pub mod config;
pub mod phases;
pub mod report;
pub mod run;

pub use config::cmd_config;
pub use phases::cmd_phases;
pub use report::cmd_report;
pub use run::run_operation;
