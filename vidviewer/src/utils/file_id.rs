//! Random identifiers naming library files on disk.

/// Alphabet file ids are drawn from.
pub const FILE_ID_CHARSET: &[u8] = b"abcdef0123456789";

/// Length of a generated file id.
pub const FILE_ID_LEN: usize = 12;

/// Generate a new random file id.
pub fn generate_file_id() -> String {
    (0..FILE_ID_LEN)
        .map(|_| {
            let idx = rand::random::<u32>() as usize % FILE_ID_CHARSET.len();
            FILE_ID_CHARSET[idx] as char
        })
        .collect()
}

/// Whether `id` looks like a generated file id. Also guards shard paths
/// against traversal since only the charset is allowed.
pub fn is_valid_file_id(id: &str) -> bool {
    id.len() >= 6 && id.bytes().all(|b| FILE_ID_CHARSET.contains(&b))
}
