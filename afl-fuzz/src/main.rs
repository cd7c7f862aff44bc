use std::io::Cursor;

use tracing_subscriber::EnvFilter;

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    afl::fuzz!(|data: &[u8]| {
        let _ = picdate::extract_bytes(data);
        let _ = picdate::extract(Cursor::new(data));
        if let Ok(mut src) = picdate::ByteSource::new(Cursor::new(data)) {
            let len = src.len();
            let _ = picdate::dump_box_tree(&mut src, 0..len);
        }
    });
}
