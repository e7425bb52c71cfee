use rand::{distributions::Alphanumeric, thread_rng, Rng};

/// Verification codes are shown to third parties, so they are uppercased and
/// grouped for readability: `K7QF-2MNP-83XY-ZR4D`.
pub fn generate_verification_code(groups: usize, group_len: usize) -> String {
    let chars: Vec<String> = (0..groups)
        .map(|_| {
            thread_rng()
                .sample_iter(&Alphanumeric)
                .take(group_len)
                .map(|c| (c as char).to_ascii_uppercase())
                .collect()
        })
        .collect();
    chars.join("-")
}
