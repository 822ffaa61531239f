use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Random code of `len` characters drawn from upper-case letters and digits.
pub fn generate_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut output = String::with_capacity(len);
    for _ in 0..len {
        let index = rng.gen_range(0..ALPHABET.len());
        output.push(ALPHABET[index] as char);
    }
    output
}
