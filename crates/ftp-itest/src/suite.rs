//! The end-to-end suite run against a provisioned FTP server.
//!
//! Stages run in order because the first two cases assert on the exact
//! contents of a fresh server root. Cases in the last stage only add files
//! under their own names, so they run concurrently.

use anyhow::{ensure, Context};
use itest_fixture::ServiceInstance;
use itest_harness::{Suite, TestCase, TestContext};

use crate::client::{FtpClient, FtpTimeouts};
use crate::connect::connect_to;

/// Payload of the upload case: "Hello World!" and a newline.
pub const HELLO_WORLD: &[u8] = b"Hello World!\n";

pub const HELLO_WORLD_FILE: &str = "HelloWorld.txt";

type Ctx = TestContext<ServiceInstance>;

async fn client(ctx: &Ctx) -> anyhow::Result<FtpClient> {
    let server = ctx.resource()?;
    connect_to(&server, FtpTimeouts::default())
        .await
        .with_context(|| format!("connecting to {}", server.endpoint()))
}

async fn connect_and_list(ctx: Ctx) -> anyhow::Result<()> {
    let mut client = client(&ctx).await?;
    let names = client.list_names(None).await?;
    ensure!(names.is_empty(), "expected an empty root, got {names:?}");
    client.quit().await?;
    Ok(())
}

async fn upload(ctx: Ctx) -> anyhow::Result<()> {
    let mut client = client(&ctx).await?;
    client.upload(HELLO_WORLD_FILE, HELLO_WORLD, false).await?;

    let names = client.list_names(None).await?;
    ensure!(
        names == [HELLO_WORLD_FILE],
        "expected exactly {HELLO_WORLD_FILE} in the root, got {names:?}"
    );
    client.quit().await?;
    Ok(())
}

async fn connect(ctx: Ctx) -> anyhow::Result<()> {
    let client = client(&ctx).await?;
    client.quit().await?;
    Ok(())
}

async fn upload_download_bytes(ctx: Ctx) -> anyhow::Result<()> {
    const PATH: &str = "/UploadDownloadBytes/helloworld.txt";

    let mut client = client(&ctx).await?;
    client.upload(PATH, HELLO_WORLD, true).await?;
    let downloaded = client.download(PATH).await?;
    ensure!(
        downloaded == HELLO_WORLD,
        "downloaded {} bytes, expected {}",
        downloaded.len(),
        HELLO_WORLD.len()
    );
    client.quit().await?;
    Ok(())
}

async fn upload_download_row(
    ctx: Ctx,
    (name, payload): (&'static str, Vec<u8>),
) -> anyhow::Result<()> {
    let path = format!("/UploadDownloadRows/{name}.bin");

    let mut client = client(&ctx).await?;
    client.upload(&path, &payload, true).await?;
    let downloaded = client.download(&path).await?;
    ensure!(
        downloaded == payload,
        "{path}: downloaded {} bytes, expected {}",
        downloaded.len(),
        payload.len()
    );
    client.quit().await?;
    Ok(())
}

async fn get_listing(ctx: Ctx) -> anyhow::Result<()> {
    let mut client = client(&ctx).await?;
    client.upload("/GetListingFile.txt", b"root", false).await?;
    client
        .upload("/GetListing/GetListingFile.txt", b"nested", true)
        .await?;

    let root = client.list_names(None).await?;
    ensure!(
        root.iter().any(|name| name == "GetListingFile.txt"),
        "root listing misses GetListingFile.txt: {root:?}"
    );
    ensure!(
        root.iter().any(|name| name == "GetListing"),
        "root listing misses the GetListing directory: {root:?}"
    );

    let nested = client.list_names(Some("/GetListing")).await?;
    ensure!(
        nested == ["GetListingFile.txt"],
        "unexpected /GetListing listing: {nested:?}"
    );

    client.set_working_directory("/GetListing").await?;
    let here = client.list_names(None).await?;
    ensure!(
        here == ["GetListingFile.txt"],
        "unexpected listing after CWD: {here:?}"
    );
    client.quit().await?;
    Ok(())
}

async fn working_directory(ctx: Ctx) -> anyhow::Result<()> {
    let mut client = client(&ctx).await?;
    client
        .upload("/WorkingDirectory/marker.txt", b"marker", true)
        .await?;
    client.set_working_directory("/WorkingDirectory").await?;

    let pwd = match client.working_directory().await {
        Err(err) if err.code() == Some(502) => {
            return Err(ctx.request_skip("server does not implement PWD").into());
        }
        other => other?,
    };
    ensure!(
        pwd.trim_end_matches('/').ends_with("/WorkingDirectory"),
        "PWD reported {pwd:?}"
    );
    client.quit().await?;
    Ok(())
}

/// Payloads for the parameterized round trip.
fn round_trip_rows() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("empty", Vec::new()),
        ("hello", HELLO_WORLD.to_vec()),
        ("all-bytes", (0..=255u8).collect()),
        ("large", (0..64 * 1024).map(|i| (i % 251) as u8).collect()),
    ]
}

pub fn ftp_suite() -> Suite<ServiceInstance> {
    Suite::new("ftp")
        .stage([TestCase::fact("connect_and_list", connect_and_list)])
        .stage([TestCase::fact("upload", upload)])
        .stage([
            TestCase::fact("connect", connect),
            TestCase::fact("upload_download_bytes", upload_download_bytes),
            TestCase::theory(
                "upload_download_rows",
                round_trip_rows(),
                upload_download_row,
            ),
            TestCase::fact("get_listing", get_listing),
            TestCase::fact("working_directory", working_directory),
        ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suite_layout() {
        let suite = ftp_suite();
        let stages: Vec<Vec<&str>> = suite
            .stages()
            .iter()
            .map(|stage| stage.iter().map(|case| case.name()).collect())
            .collect();
        assert_eq!(
            stages,
            vec![
                vec!["connect_and_list"],
                vec!["upload"],
                vec![
                    "connect",
                    "upload_download_bytes",
                    "upload_download_rows",
                    "get_listing",
                    "working_directory",
                ],
            ]
        );
        assert_eq!(suite.stages()[2][2].row_count(), 4);
    }

    #[test]
    fn test_hello_world_is_thirteen_bytes() {
        assert_eq!(HELLO_WORLD.len(), 13);
    }
}
