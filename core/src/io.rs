use alloc::vec::Vec;

use crate::fs::File;

/// Reads the remainder of `file`, sized up front from [`File::size`].
pub fn read_to_end<F: File>(file: &mut F) -> Result<Vec<u8>, F::Error> {
    let mut data = Vec::with_capacity(file.size());
    let mut chunk = [0u8; 512];
    loop {
        let read = file.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        data.extend_from_slice(&chunk[..read]);
    }
    Ok(data)
}

pub fn write_all<F: File>(file: &mut F, data: &[u8]) -> Result<(), F::Error> {
    file.write_all(data)?;
    file.flush()
}
