#![no_main]

use libfuzzer_sys::fuzz_target;
use crl_serials::{CertificateList, SerialSet};

fuzz_target!(|data: &[u8]| {
    let crl = match CertificateList::decode(data) {
        Ok(crl) => crl,
        Err(_) => return,
    };
    assert_eq!(crl.serials().len(), crl.len());

    // The extensions are only parsed on demand and may still be broken.
    let _ = crl.crl_number();
    for entry in crl.revoked() {
        let _ = entry.reason();
    }

    let mut set = SerialSet::new();
    let added = set.add_revoked(&crl);
    assert_eq!(added, set.len());
    assert!(set.len() <= crl.len());
    assert_eq!(set.add_revoked(&crl), 0);
    for serial in crl.serials() {
        assert!(set.contains(serial));
    }
});
