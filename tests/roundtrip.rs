//! End-to-end container properties: round-trip identity, wire-shape
//! invariants, integrity warnings, and reference bindings.

use std::sync::Arc;

use quip::{
    AuxPayload, AuxTag, ContainerReader, ContainerWriter, ContainerWriterBuilder, MAGIC,
    ReadRecord, ReadRecordBuilder, ReferenceSet, Result, SourceFormat,
};

fn read(id: &str, seq: &str, qual: &str) -> ReadRecord {
    ReadRecordBuilder::default()
        .id(id.as_bytes())
        .seq(seq.as_bytes())
        .qual(qual.as_bytes())
        .build()
        .unwrap()
}

fn compress(records: &[ReadRecord]) -> Result<Vec<u8>> {
    let mut writer = ContainerWriter::new(Vec::new())?;
    for record in records {
        writer.push(record)?;
    }
    writer.into_inner()
}

fn decompress(bytes: &[u8]) -> Result<Vec<ReadRecord>> {
    let mut reader = ContainerReader::new(bytes, None)?;
    reader.records().collect()
}

// ---------------------------------------------------------------------
// block-walking helpers for wire-shape assertions
// ---------------------------------------------------------------------

fn take_u32(bytes: &[u8], pos: &mut usize) -> u32 {
    let v = u32::from_be_bytes(bytes[*pos..*pos + 4].try_into().unwrap());
    *pos += 4;
    v
}

fn take_u64(bytes: &[u8], pos: &mut usize) -> u64 {
    let v = u64::from_be_bytes(bytes[*pos..*pos + 8].try_into().unwrap());
    *pos += 8;
    v
}

struct BlockShape {
    reads: u32,
    bases: u32,
    readlens: Vec<(u32, u32)>,
    schemes: Vec<(u8, u32)>,
    /// (uncompressed, compressed, crc) per field in id/aux/seq/qual order
    segments: [(u32, u32, u64); 4],
    /// Offset of the first metadata triple, for targeted corruption
    meta_offset: usize,
}

/// Walk the blocks of a container with an empty prefix (no reference, no
/// assembly parameter, empty aux payload).
fn parse_blocks(bytes: &[u8]) -> Vec<BlockShape> {
    let mut pos = 17; // magic(6) version(1) flags(1) aux fmt(1) aux len(8)
    let mut blocks = Vec::new();
    loop {
        let reads = take_u32(bytes, &mut pos);
        if reads == 0 {
            assert_eq!(pos, bytes.len(), "terminator must end the container");
            return blocks;
        }
        let bases = take_u32(bytes, &mut pos);

        let mut readlens = Vec::new();
        let mut covered = 0u64;
        while covered < u64::from(reads) {
            let value = take_u32(bytes, &mut pos);
            let run = take_u32(bytes, &mut pos);
            readlens.push((value, run));
            covered += u64::from(run);
        }

        let mut schemes = Vec::new();
        covered = 0;
        while covered < u64::from(reads) {
            let base = bytes[pos];
            pos += 1;
            let run = take_u32(bytes, &mut pos);
            schemes.push((base, run));
            covered += u64::from(run);
        }

        let meta_offset = pos;
        let mut segments = [(0u32, 0u32, 0u64); 4];
        for segment in &mut segments {
            let raw = take_u32(bytes, &mut pos);
            let z = take_u32(bytes, &mut pos);
            let crc = take_u64(bytes, &mut pos);
            *segment = (raw, z, crc);
        }
        for segment in &segments {
            pos += segment.1 as usize;
        }

        blocks.push(BlockShape {
            reads,
            bases,
            readlens,
            schemes,
            segments,
            meta_offset,
        });
    }
}

// ---------------------------------------------------------------------
// round-trip identity
// ---------------------------------------------------------------------

#[test]
fn roundtrip_basic() -> Result<()> {
    let records = vec![
        ReadRecord {
            id: b"SRR123.1".to_vec(),
            aux: vec![
                AuxTag::new(*b"NM", b'i', vec![0, 0, 0, 3]),
                AuxTag::new(*b"RG", b'Z', b"lane1".to_vec()),
            ],
            seq: b"ACGTNNACGT".to_vec(),
            qual: b"IIIIHHIIII".to_vec(),
        },
        ReadRecord {
            id: b"SRR123.2".to_vec(),
            aux: Vec::new(),
            seq: b"acgtACGT".to_vec(),
            qual: b"########".to_vec(),
        },
        ReadRecord::default(),
    ];
    let bytes = compress(&records)?;
    assert_eq!(decompress(&bytes)?, records);
    Ok(())
}

#[test]
fn roundtrip_empty_sequences_are_not_dropped() -> Result<()> {
    let records: Vec<ReadRecord> = (0..3)
        .map(|i| ReadRecord {
            id: format!("empty.{i}").into_bytes(),
            aux: Vec::new(),
            seq: Vec::new(),
            qual: Vec::new(),
        })
        .collect();
    let bytes = compress(&records)?;
    assert_eq!(decompress(&bytes)?, records);
    Ok(())
}

#[test]
fn roundtrip_multiple_chunks_single_block() -> Result<()> {
    let records: Vec<ReadRecord> = (0..6000)
        .map(|i| read(&format!("chunky.{i}"), "ACGTACGTNA", "IIIIIIIIII"))
        .collect();
    let bytes = compress(&records)?;

    let blocks = parse_blocks(&bytes);
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].reads, 6000);
    assert_eq!(blocks[0].bases, 60000);

    assert_eq!(decompress(&bytes)?, records);
    Ok(())
}

#[test]
fn roundtrip_multiple_blocks_with_scheme_carry() -> Result<()> {
    // 1001-base reads make a full chunk exceed the block threshold, so
    // every 5000-read chunk closes a block at the next admission.
    let seq: String = "ACGTN".chars().cycle().take(1001).collect();
    let hi_qual = "I".repeat(1001);
    let lo_qual = "#".repeat(1001);

    let mut records = Vec::new();
    for i in 0..5000 {
        records.push(read(&format!("b1.{i}"), &seq, &hi_qual));
    }
    for i in 0..5001 {
        records.push(read(&format!("b2.{i}"), &seq, &lo_qual));
    }
    let bytes = compress(&records)?;

    let blocks = parse_blocks(&bytes);
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].reads, 5000);
    assert_eq!(blocks[0].bases, 5_005_000);
    assert_eq!(blocks[0].readlens, vec![(1001, 5000)]);
    assert_eq!(blocks[0].schemes, vec![(b'I', 5000)]);

    // The active scheme is carried into block 2 as a zero-run sentinel,
    // then replaced by the lower-based scheme the first chunk opens.
    assert_eq!(blocks[1].reads, 5001);
    assert_eq!(blocks[1].schemes, vec![(b'I', 0), (b'#', 5001)]);

    assert_eq!(decompress(&bytes)?, records);
    Ok(())
}

#[test]
fn roundtrip_scheme_shift_within_block() -> Result<()> {
    // Two full chunks in one block; the second chunk's maximum escapes the
    // first scheme's window, opening a second scheme at its minimum.
    let mut records = Vec::new();
    for i in 0..5000 {
        records.push(read(&format!("lo.{i}"), "ACGT", "#$%&"));
    }
    for i in 0..5000 {
        records.push(read(&format!("hi.{i}"), "ACGT", "efgh"));
    }
    let bytes = compress(&records)?;

    let blocks = parse_blocks(&bytes);
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].schemes, vec![(b'#', 5000), (b'e', 5000)]);

    assert_eq!(decompress(&bytes)?, records);
    Ok(())
}

// ---------------------------------------------------------------------
// wire-shape invariants
// ---------------------------------------------------------------------

#[test]
fn magic_and_terminator_are_stable() -> Result<()> {
    let records = vec![read("r1", "ACGT", "IIII")];
    let bytes = compress(&records)?;
    assert_eq!(&bytes[..6], &MAGIC);
    assert_eq!(&bytes[bytes.len() - 4..], &[0, 0, 0, 0]);
    Ok(())
}

#[test]
fn single_chunk_block_shape() -> Result<()> {
    let records: Vec<ReadRecord> = (1..=10)
        .map(|i| read(&format!("r{i}"), "ACGT", "IIII"))
        .collect();
    let bytes = compress(&records)?;

    let blocks = parse_blocks(&bytes);
    assert_eq!(blocks.len(), 1);
    let block = &blocks[0];
    assert_eq!(block.reads, 10);
    assert_eq!(block.bases, 40);
    assert_eq!(block.readlens, vec![(4, 10)]);
    assert_eq!(block.schemes, vec![(b'I', 10)]);

    // uncompressed byte accounting: ids are "r1".."r10" (2 or 3 bytes)
    assert_eq!(block.segments[0].0, 21);
    assert_eq!(block.segments[1].0, 0);
    assert_eq!(block.segments[2].0, 40);
    assert_eq!(block.segments[3].0, 40);
    Ok(())
}

#[test]
fn rle_runs_sum_to_block_reads() -> Result<()> {
    let records: Vec<ReadRecord> = (0..100)
        .map(|i| {
            let len = 50 + (i % 2);
            let seq: String = "ACGT".chars().cycle().take(len).collect();
            let qual = "I".repeat(len);
            read(&format!("v.{i}"), &seq, &qual)
        })
        .collect();
    let bytes = compress(&records)?;

    for block in parse_blocks(&bytes) {
        let readlen_total: u64 = block.readlens.iter().map(|&(_, r)| u64::from(r)).sum();
        let scheme_total: u64 = block.schemes.iter().map(|&(_, r)| u64::from(r)).sum();
        assert_eq!(readlen_total, u64::from(block.reads));
        assert_eq!(scheme_total, u64::from(block.reads));
    }
    Ok(())
}

// ---------------------------------------------------------------------
// integrity
// ---------------------------------------------------------------------

#[test]
fn crc_mismatch_is_non_fatal() -> Result<()> {
    let records: Vec<ReadRecord> = (0..10)
        .map(|i| read(&format!("crc.{i}"), "ACGTACGT", "IIIIIIII"))
        .collect();
    let mut bytes = compress(&records)?;

    // Corrupt the stored quality checksum of the first block; decoding
    // must still return every read and merely warn.
    let blocks = parse_blocks(&bytes);
    let qual_crc_offset = blocks[0].meta_offset + 3 * 16 + 8;
    bytes[qual_crc_offset] ^= 0xFF;

    let decoded = decompress(&bytes)?;
    assert_eq!(decoded, records);
    Ok(())
}

// ---------------------------------------------------------------------
// header surface
// ---------------------------------------------------------------------

#[test]
fn aux_payload_and_assembly_parameter_roundtrip() -> Result<()> {
    let aux = AuxPayload {
        format: SourceFormat::Sam,
        data: b"@HD\tVN:1.6\n@SQ\tSN:chr1\tLN:4\n".to_vec(),
    };
    let mut writer = ContainerWriterBuilder::default()
        .aux(aux.clone())
        .assembly_n(190)
        .build(Vec::new())?;
    writer.push(&read("r1", "ACGT", "IIII"))?;
    let bytes = writer.into_inner()?;

    let mut reader = ContainerReader::new(bytes.as_slice(), None)?;
    assert_eq!(reader.version(), 3);
    assert!(reader.is_assembly_based());
    assert!(!reader.is_reference_based());
    assert_eq!(reader.assembly_n(), Some(190));
    assert_eq!(reader.aux(), &aux);

    let decoded: Result<Vec<ReadRecord>> = reader.records().collect();
    assert_eq!(decoded?.len(), 1);
    Ok(())
}

#[test]
fn bad_magic_is_rejected() -> Result<()> {
    let mut bytes = compress(&[read("r1", "ACGT", "IIII")])?;
    bytes[0] = 0x1F;
    assert!(ContainerReader::new(bytes.as_slice(), None).is_err());
    Ok(())
}

// ---------------------------------------------------------------------
// reference binding
// ---------------------------------------------------------------------

fn load_reference(path: &str, content: &str) -> ReferenceSet {
    std::fs::write(path, content).unwrap();
    let set = ReferenceSet::from_fasta(path).unwrap();
    std::fs::remove_file(path).unwrap();
    set
}

#[test]
fn reference_binding_roundtrip_and_mismatch() -> Result<()> {
    let reference = load_reference(
        "test_binding_ref.fa",
        ">chr1\nACGTACGTACGTACGT\n>chr2\nTTTTCCCC\n",
    );
    // one base differs in chr2
    let wrong = load_reference(
        "test_binding_wrong.fa",
        ">chr1\nACGTACGTACGTACGT\n>chr2\nTTTTCCCG\n",
    );

    let records = vec![read("aligned.1", "ACGTACGT", "IIIIIIII")];
    let mut writer = ContainerWriterBuilder::default()
        .reference(Arc::new(reference.clone()))
        .build(Vec::new())?;
    for record in &records {
        writer.push(record)?;
    }
    let bytes = writer.into_inner()?;

    // matching reference: decodes
    let mut reader = ContainerReader::new(bytes.as_slice(), Some(&reference))?;
    assert!(reader.is_reference_based());
    let decoded: Result<Vec<ReadRecord>> = reader.records().collect();
    assert_eq!(decoded?, records);

    // differing reference: fatal mismatch
    assert!(ContainerReader::new(bytes.as_slice(), Some(&wrong)).is_err());

    // missing reference: fatal
    assert!(ContainerReader::new(bytes.as_slice(), None).is_err());
    Ok(())
}
