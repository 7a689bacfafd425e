//! # CRD Generator
//!
//! Prints the `Issuer` and `ClusterIssuer` CustomResourceDefinitions as YAML.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/issuers.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```
//!
//! `CertificateRequest` belongs to cert-manager and is not generated here.

use azure_keyvault_issuer::crd::{ClusterIssuer, Issuer};
use kube::core::CustomResourceExt;

fn main() {
    let crds = [Issuer::crd(), ClusterIssuer::crd()];

    println!("# This file is auto-generated by crdgen");
    println!("# DO NOT EDIT THIS FILE MANUALLY");
    println!("# Change the types in src/crd/issuer.rs instead");
    for crd in &crds {
        match serde_yaml::to_string(crd) {
            Ok(yaml) => {
                println!("---");
                print!("{yaml}");
            }
            Err(e) => {
                eprintln!("Failed to serialize CRD to YAML: {e}");
                std::process::exit(1);
            }
        }
    }
}
