//! Prints every CRD served by this operator as a YAML stream, ready for
//! `kubectl apply -f -`.

use kube::CustomResourceExt;
use trust_stack_operator::crd::{
    CertificateAuthority, MetadataService, TimestampAuthority, TransparencyLog, TreeLog, TrustStack,
};

fn main() {
    let crds = [
        TrustStack::crd(),
        TimestampAuthority::crd(),
        TransparencyLog::crd(),
        TreeLog::crd(),
        CertificateAuthority::crd(),
        MetadataService::crd(),
    ];
    for crd in crds {
        print!(
            "---\n{}",
            serde_yaml::to_string(&crd).expect("failed to serialize CRD")
        );
    }
}
