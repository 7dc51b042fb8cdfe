//! Prints the funcop CRD manifests as multi-document YAML.
//!
//! Usage: `cargo run --bin crdgen > deploy/crds.yaml`

use crds::{CronJobTrigger, Function, HTTPTrigger};
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&Function::crd())?);
    println!("---");
    print!("{}", serde_yaml::to_string(&HTTPTrigger::crd())?);
    println!("---");
    print!("{}", serde_yaml::to_string(&CronJobTrigger::crd())?);
    Ok(())
}
