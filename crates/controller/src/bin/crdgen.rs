//! CRD generation binary for the HealthCheck controller

use healthcheck_controller::HealthCheck;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&HealthCheck::crd())?);
    Ok(())
}
