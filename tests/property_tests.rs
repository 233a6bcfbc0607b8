// Property tests for key rewriting and merge-scanning

use kvimport::import::{scan_files, KeyRewrite, KeyRewriter, ScanInput};
use kvimport::keys::Span;
use kvimport::mvcc::{MvccKey, Timestamp, Value};
use kvimport::sstable::SSTableBuilder;
use kvimport::storage::{ExternalStorage, MemoryStorage};
use kvimport::{CancelToken, ImportOptions};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

const OLD: &[u8] = b"\x12old";
const NEW: &[u8] = b"\x12\xffnew/";

fn rewriter() -> KeyRewriter {
    KeyRewriter::new(vec![KeyRewrite::new(OLD.to_vec(), NEW.to_vec())]).unwrap()
}

proptest! {
    #[test]
    fn prop_rewrite_preserves_order(
        a in proptest::collection::vec(any::<u8>(), 0..16),
        b in proptest::collection::vec(any::<u8>(), 0..16),
    ) {
        let kr = rewriter();
        let ka = [OLD, a.as_slice()].concat();
        let kb = [OLD, b.as_slice()].concat();
        let ra = kr.rewrite_key(&ka).unwrap();
        let rb = kr.rewrite_key(&kb).unwrap();

        prop_assert_eq!(ka.cmp(&kb), ra.cmp(&rb));
        prop_assert!(ra.starts_with(NEW));
        prop_assert_eq!(&ra[NEW.len()..], a.as_slice());
    }

    #[test]
    fn prop_keys_without_prefix_are_unrewritable(
        key in proptest::collection::vec(any::<u8>(), 0..16),
    ) {
        prop_assume!(!key.starts_with(OLD));
        prop_assert!(rewriter().rewrite_key(&key).is_none());
    }

    #[test]
    fn prop_merge_keeps_newest_version(
        seed in any::<u64>(),
        num_files in 1usize..5,
        threads in 1usize..4,
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let storage = Arc::new(MemoryStorage::new("prop"));

        // (suffix) -> (timestamp, data) expected after merging
        let mut expected: BTreeMap<Vec<u8>, (Timestamp, Vec<u8>)> = BTreeMap::new();
        let mut inputs = Vec::new();

        for f in 0..num_files {
            let suffixes: BTreeSet<Vec<u8>> = (0..rng.random_range(0..40))
                .map(|_| format!("k{:03}", rng.random_range(0..60u32)).into_bytes())
                .collect();

            let mut builder = SSTableBuilder::in_memory();
            for suffix in suffixes {
                let key = [OLD, suffix.as_slice()].concat();
                let ts = Timestamp::new(rng.random_range(1..8u64), rng.random_range(0..2u32));
                let data = format!("f{}-{}", f, ts).into_bytes();
                let mut value = Value::from_bytes(&data);
                value.init_checksum(&key);
                builder.add(&MvccKey::new(key, ts), value.raw_bytes()).unwrap();

                // Strictly newer replaces; ties keep the earlier file
                match expected.get(&suffix) {
                    Some((existing, _)) if *existing >= ts => {}
                    _ => {
                        expected.insert(suffix, (ts, data));
                    }
                }
            }

            let path = format!("{}.sst", f);
            storage.write_file(&path, builder.finish_to_bytes().unwrap()).unwrap();
            inputs.push(ScanInput::new(Arc::clone(&storage) as Arc<dyn ExternalStorage>, path));
        }

        let merged = scan_files(
            &inputs,
            &Span::new(OLD.to_vec(), Vec::new()),
            &rewriter(),
            &ImportOptions::default().scan_threads(threads),
            &CancelToken::new(),
        )
        .unwrap();

        prop_assert_eq!(merged.entries.len(), expected.len());
        prop_assert!(merged.entries.windows(2).all(|w| w[0].key.key < w[1].key.key));

        for (kv, (suffix, (ts, data))) in merged.entries.iter().zip(&expected) {
            prop_assert_eq!(&kv.key.key, &[NEW, suffix.as_slice()].concat());
            prop_assert_eq!(kv.key.timestamp, *ts);
            let value = Value::from_raw(&kv.key.key, kv.value.clone()).unwrap();
            prop_assert_eq!(value.data(), data.as_slice());
            prop_assert!(value.verify(&kv.key.key).is_ok());
        }
    }
}
