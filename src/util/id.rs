use rand::Rng;

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of client-generated identifiers.
pub const TOKEN_LEN: usize = 9;

/// A random lowercase base36 token of [`TOKEN_LEN`] characters.
///
/// Short enough that the remote store never mistakes it for one of its own
/// document ids.
pub fn new_token() -> String {
    let mut rng = rand::thread_rng();
    (0..TOKEN_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
