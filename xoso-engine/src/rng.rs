use rand::RngCore;

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// Générateur xorshift32 amorcé par le hachage FNV-1a d'une graine textuelle.
///
/// Chaque appel de construction de grilles possède sa propre instance : la
/// même graine redonne toujours la même suite.
#[derive(Debug, Clone)]
pub struct SeededRng {
    state: u32,
}

impl SeededRng {
    pub fn from_seed_str(seed: &str) -> Self {
        let mut h = FNV_OFFSET_BASIS;
        for unit in seed.encode_utf16() {
            h ^= unit as u32;
            h = h.wrapping_mul(FNV_PRIME);
        }
        // xorshift reste bloqué sur un état nul
        if h == 0 {
            h = FNV_OFFSET_BASIS;
        }
        Self { state: h }
    }

    fn step(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Tirage uniforme dans [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.step() as f64 / 4_294_967_296.0
    }
}

impl RngCore for SeededRng {
    fn next_u32(&mut self) -> u32 {
        self.step()
    }

    fn next_u64(&mut self) -> u64 {
        let hi = self.step() as u64;
        let lo = self.step() as u64;
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        for chunk in dst.chunks_mut(4) {
            let bytes = self.step().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}
