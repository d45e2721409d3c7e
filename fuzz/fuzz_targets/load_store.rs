#![no_main]

use libfuzzer_sys::fuzz_target;
use primes_core::PrimeStore;
use primes_core::io::MemIo;

// Arbitrary shard bytes must either load, re-save to identical bytes and
// verify clean, or fail with a format violation. Never panic.
fuzz_target!(|data: &[u8]| {
    let Some((&selector, rest)) = data.split_first() else {
        return;
    };

    let io = MemIo::new();
    let shard_count = usize::from(selector % 4) + 1;
    let chunk = rest.len() / shard_count + 1;
    for (i, bytes) in rest.chunks(chunk).enumerate() {
        let width = if selector & 0x80 == 0 { i + 1 } else { i + 2 };
        io.insert(format!("primes/primes_{width}.bin"), bytes.to_vec());
    }

    let store = PrimeStore::new("primes", io.clone());
    match store.load() {
        Ok(primes) => {
            let fresh = MemIo::new();
            let copy = PrimeStore::new("primes", fresh.clone());
            copy.save(&primes).expect("saving a loaded sequence must succeed");
            for width in 1..=8 {
                let path = store.shard_path(width);
                assert_eq!(io.get(&path), fresh.get(&path), "width {width} drifted");
            }
            assert!(store.verify().expect("verify").is_clean());
        }
        Err(err) => assert!(err.is_format_violation(), "unexpected error: {err}"),
    }
});
