//! End-to-end FTP suite against a real container.
//!
//! Runs as a plain binary (`harness = false`) so one container is shared by
//! every case. Set `FTP_ITEST_SERVER_KEY` to `pure-ftpd` or `vsftpd` to run
//! it; without the key every case reports skipped and Docker is never
//! touched.
//!
//! ```text
//! FTP_ITEST_SERVER_KEY=vsftpd cargo test -p ftp-itest --test ftp_integration
//! FTP_ITEST_SERVER_KEY=vsftpd cargo test -p ftp-itest --test ftp_integration -- listing
//! FTP_ITEST_SERVER_KEY=vsftpd cargo test -p ftp-itest --test ftp_integration -- --skip upload
//! ```

use std::sync::Arc;

use anyhow::bail;
use clap::Parser;
use ftp_itest::{ftp_suite, SuiteArgs};
use itest_fixture::Provisioner;
use itest_harness::telemetry::init_tracing;
use itest_harness::{Session, SessionConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = SuiteArgs::parse();
    let config = SessionConfig::from_env();
    let config = if args.json {
        config.with_json_logs(true)
    } else {
        config
    };
    init_tracing(&config, args.log_level());

    let suite = args.select(ftp_suite());
    if args.list {
        for name in suite.case_names() {
            println!("{name}: test");
        }
        println!();
        println!("{} tests", suite.case_count());
        return Ok(());
    }

    let provisioner = Arc::new(Provisioner::from_env());
    let session = Session::new(provisioner, config);
    let report = session.run(&suite).await?;

    if !args.quiet {
        for event in &report.events {
            println!("test {} ... {}", event.label(), event.outcome.name());
        }
        if let Some(reason) = &report.skip_reason {
            println!("skipped: {reason}");
        }
        println!();
    }
    println!("{}", report.render());
    info!(report = %report.to_json()?, "Session report");

    if !report.success() {
        bail!("ftp suite failed");
    }
    Ok(())
}
