//! Maps room codes to the mailbox of their actor task. See §3 Room and §5.

use dashmap::DashMap;
use rand::Rng;

use crate::room::RoomHandle;

const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 4;
const MAX_COLLISION_ATTEMPTS: u32 = 100;

#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, RoomHandle>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        RoomRegistry { rooms: DashMap::new() }
    }

    /// Generates an unused `BT-XXXX` code. After 100 collisions (practically
    /// unreachable at any realistic room count) falls back to appending a
    /// base-36 timestamp suffix so it is guaranteed to terminate.
    pub fn generate_code(&self) -> String {
        let mut rng = rand::thread_rng();
        for _ in 0..MAX_COLLISION_ATTEMPTS {
            let candidate = random_code(&mut rng);
            if !self.rooms.contains_key(&candidate) {
                return candidate;
            }
        }
        let suffix = to_base36(crate::clock::now_ms() as u64);
        format!("BT-{}{}", random_code(&mut rng).trim_start_matches("BT-"), suffix)
    }

    pub fn insert(&self, code: String, handle: RoomHandle) {
        self.rooms.insert(code, handle);
    }

    pub fn get(&self, code: &str) -> Option<RoomHandle> {
        self.rooms.get(code).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, code: &str) {
        self.rooms.remove(code);
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

fn random_code(rng: &mut impl Rng) -> String {
    let body: String = (0..CODE_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("BT-{body}")
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_use_restricted_alphabet() {
        let registry = RoomRegistry::new();
        let code = registry.generate_code();
        assert!(code.starts_with("BT-"));
        let body = &code[3..];
        assert_eq!(body.len(), CODE_LEN);
        assert!(body.chars().all(|c| ALPHABET.contains(&(c as u8))));
    }

    #[test]
    fn excludes_ambiguous_characters() {
        for &c in ALPHABET {
            assert!(!matches!(c, b'I' | b'O' | b'0' | b'1'));
        }
    }

    #[test]
    fn base36_roundtrips_zero_and_nonzero() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn empty_registry_has_no_rooms() {
        let registry = RoomRegistry::new();
        assert!(registry.get("BT-ABCD").is_none());
        assert_eq!(registry.room_count(), 0);
    }
}
