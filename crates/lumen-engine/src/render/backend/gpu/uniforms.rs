//! Per-frame uniform upload.
//!
//! Every draw snapshots its program's uniform block. At present the snapshots
//! are packed into one buffer at aligned offsets and each draw binds group 0
//! with its dynamic offset, so draws sharing a program never overwrite each
//! other's values within a frame.

/// Packs `blocks` at multiples of `alignment`. Empty blocks take no space and
/// get offset 0.
///
/// Returns the packed bytes and one offset per block.
pub(super) fn pack_blocks<'a>(
    alignment: u64,
    blocks: impl IntoIterator<Item = &'a [u8]>,
) -> (Vec<u8>, Vec<u32>) {
    let mut bytes = Vec::new();
    let mut offsets = Vec::new();

    for block in blocks {
        if block.is_empty() {
            offsets.push(0);
            continue;
        }
        let offset = align_up(bytes.len() as u64, alignment);
        bytes.resize(offset as usize, 0);
        bytes.extend_from_slice(block);
        offsets.push(offset as u32);
    }

    (bytes, offsets)
}

pub(super) fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

/// GPU buffer holding one frame of packed uniform blocks.
///
/// Grows to the next power of two when a frame does not fit; bind groups that
/// reference it must be rebuilt after growth (see [`UniformArena::generation`]).
pub(super) struct UniformArena {
    buffer: Option<wgpu::Buffer>,
    capacity: u64,
    generation: u64,
}

/// Smallest buffer allocated; most frames fit without growth.
const MIN_CAPACITY: u64 = 16 * 1024;

impl UniformArena {
    pub(super) fn new() -> Self {
        Self {
            buffer: None,
            capacity: 0,
            generation: 0,
        }
    }

    /// Uploads `bytes` at offset 0, growing the buffer if needed.
    pub(super) fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, bytes: &[u8]) {
        let required = (bytes.len() as u64).max(1);
        if self.buffer.is_none() || required > self.capacity {
            let capacity = required.next_power_of_two().max(MIN_CAPACITY);
            self.buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("lumen uniform arena"),
                size: capacity,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            self.capacity = capacity;
            self.generation += 1;
            log::debug!("uniform arena grown to {capacity} bytes");
        }

        if let (Some(buffer), false) = (&self.buffer, bytes.is_empty()) {
            queue.write_buffer(buffer, 0, bytes);
        }
    }

    pub(super) fn buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffer.as_ref()
    }

    /// Incremented whenever the underlying buffer is replaced.
    pub(super) fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_are_aligned() {
        let a = [1u8; 208];
        let b = [2u8; 64];
        let (bytes, offsets) = pack_blocks(256, [&a[..], &b[..]]);
        assert_eq!(offsets, vec![0, 256]);
        assert_eq!(bytes.len(), 256 + 64);
        assert_eq!(bytes[255], 0);
        assert_eq!(bytes[256], 2);
    }

    #[test]
    fn empty_blocks_take_no_space() {
        let a = [1u8; 16];
        let (bytes, offsets) = pack_blocks(256, [&[][..], &a[..], &[][..]]);
        assert_eq!(offsets, vec![0, 0, 0]);
        assert_eq!(bytes.len(), 16);
    }

    #[test]
    fn align_up_rounds_to_multiple() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(512, 256), 512);
    }
}
