use bytes::Bytes;

/// A delimited test object and what the job should turn it into.
#[allow(dead_code)]
pub struct Fixture {
    pub object: Bytes,
    pub rows: Vec<String>,
    pub expected_output: Vec<u8>,
}

/// Build a header plus `rows` data lines of varying length (12 to 32
/// bytes of content), terminated with `terminator`. The same seed always
/// yields the same object.
#[allow(dead_code)]
pub fn delimited_object(seed: u64, rows: usize, terminator: &str) -> Fixture {
    let mut state = seed;
    let mut data: Vec<String> = Vec::with_capacity(rows);
    for i in 0..rows {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let pad = ((state >> 33) % 16) as usize;
        data.push(format!("{i:08},{},{:x}", "v".repeat(pad + 1), state >> 40));
    }
    build(" Id,Name,Value ", &data, terminator, "id,name,value")
}

/// Assemble an object from a raw header and rows.
#[allow(dead_code)]
pub fn build(header: &str, rows: &[String], terminator: &str, output_header: &str) -> Fixture {
    let mut object = String::new();
    object.push_str(header);
    object.push_str(terminator);
    for row in rows {
        object.push_str(row);
        object.push_str(terminator);
    }

    let mut expected_output = format!("{output_header}\n").into_bytes();
    for row in rows {
        expected_output.extend_from_slice(row.as_bytes());
        expected_output.push(b'\n');
    }

    Fixture {
        object: Bytes::from(object),
        rows: rows.to_vec(),
        expected_output,
    }
}
