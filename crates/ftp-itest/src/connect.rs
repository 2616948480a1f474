//! Binding between a provisioned service and the client.

use itest_fixture::ServiceInstance;

use crate::client::{FtpClient, FtpTimeouts};
use crate::error::Result;

/// Connect to `instance` and log in with its credentials.
pub async fn connect_to(instance: &ServiceInstance, timeouts: FtpTimeouts) -> Result<FtpClient> {
    let endpoint = instance.endpoint();
    let mut client = FtpClient::connect(&endpoint.host, endpoint.port, timeouts).await?;
    let credentials = instance.credentials();
    client
        .login(credentials.username(), credentials.password())
        .await?;
    Ok(client)
}
