//! End-to-end FTP suite.
//!
//! A small passive-mode [`FtpClient`], the glue that logs it into a
//! provisioned [`itest_fixture::ServiceInstance`], and [`ftp_suite`], the
//! staged cases the `ftp_integration` test binary runs, selected by
//! [`SuiteArgs`].

pub mod cli;
pub mod client;
pub mod connect;
pub mod error;
pub mod reply;
pub mod suite;

pub use cli::SuiteArgs;
pub use client::{FtpClient, FtpTimeouts};
pub use connect::connect_to;
pub use error::{FtpError, Result};
pub use reply::Reply;
pub use suite::{ftp_suite, HELLO_WORLD, HELLO_WORLD_FILE};
