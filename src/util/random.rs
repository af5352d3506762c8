use rand::{prelude::ThreadRng, Rng};
pub trait Random {
    fn gen(rng: &mut ThreadRng) -> Self;
}

const RANDOM_KEY_MIN: usize = 1;
const RANDOM_KEY_MAX: usize = 8;

impl Random for String {
    // get random lowercase string shaped like a symbol key,
    // whose length is in [RANDOM_KEY_MIN, RANDOM_KEY_MAX]
    fn gen(rng: &mut ThreadRng) -> Self {
        let length: usize = rng.gen_range(RANDOM_KEY_MIN..=RANDOM_KEY_MAX);

        (0..length)
            .map(|_| rng.gen_range(b'a'..=b'z') as char)
            .collect()
    }
}

impl Random for u64 {
    fn gen(rng: &mut ThreadRng) -> Self {
        rng.gen()
    }
}
