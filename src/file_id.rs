//! Build identifier extraction.
//!
//! Strategy order: an embedded identity (CodeView PDB 7.0 record for PE,
//! GNU build-id note for ELF), then a fallback hash over the leading bytes
//! of the code section, then the nil placeholder. The hash is an XOR fold
//! with weak diffusion; its only contract is that identical input bytes
//! produce identical identifiers.

use tracing::{debug, warn};

use crate::formats::{ObjectFile, ObjectReader};
use crate::module::BuildId;

/// How much of the code section participates in the fallback hash.
const HASH_LIMIT: usize = 4096;

/// XOR-fold 16-byte blocks over up to the first 4096 bytes of `data`.
/// Returns None for empty input.
pub fn hash_bytes(data: &[u8]) -> Option<BuildId> {
    if data.is_empty() {
        return None;
    }

    let mut id = [0u8; 16];
    for block in data[..data.len().min(HASH_LIMIT)].chunks(16) {
        for (out, byte) in id.iter_mut().zip(block) {
            *out ^= byte;
        }
    }
    Some(BuildId::from_bytes(&id))
}

/// Compute the identifier for an object file.
///
/// Never fails: when no strategy applies the result is `BuildId::NIL`,
/// meaning "no reliable identity"; extraction still proceeds.
pub fn file_identifier(object: &ObjectFile<'_>) -> BuildId {
    if let Some(id) = object.build_id() {
        debug!(id = %hex::encode(id.bytes), "using embedded build identity");
        return id;
    }

    if let Some(section) = object.section_by_name(".text") {
        if let Some(id) = hash_bytes(section.data) {
            debug!(id = %hex::encode(id.bytes), "hashed .text for build identity");
            return id;
        }
    }

    warn!("no build identity found, using placeholder");
    BuildId::NIL
}
