//! Memory - Target memory readers
//!
//! The cache pulls bytes through the [`MemoryReader`] trait. Two readers are
//! provided: [`ProcessMemory`] for a live (usually paused) process and
//! [`ImageMemory`] for a raw memory image mapped at a base address.

use std::path::Path;

use thiserror::Error;

/// Memory operation errors
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Failed to read memory at {address:#x}: {reason}")]
    ReadFailed { address: u64, reason: String },

    #[error("Address {address:#x} (+{size}) is outside the mapped image")]
    OutOfRange { address: u64, size: usize },

    #[error("Failed to load memory image {path}: {reason}")]
    ImageLoad { path: String, reason: String },

    #[error("No process attached")]
    NoProcess,
}

/// Source of target memory for the paged cache
///
/// Implementations fill `buffer` from `address` and report how many bytes
/// were produced. The cache treats an error as "no data": the buffer stays
/// zeroed and the next diff pass sees no change.
pub trait MemoryReader {
    fn read(&mut self, address: u64, buffer: &mut [u8]) -> Result<usize, MemoryError>;
}

impl<R: MemoryReader + ?Sized> MemoryReader for Box<R> {
    fn read(&mut self, address: u64, buffer: &mut [u8]) -> Result<usize, MemoryError> {
        (**self).read(address, buffer)
    }
}

/// Raw memory image mapped at a fixed base address
///
/// Bytes outside the image read as zero; a read that does not touch the
/// image at all is an error.
#[derive(Debug, Clone)]
pub struct ImageMemory {
    base: u64,
    data: Vec<u8>,
}

impl ImageMemory {
    pub fn new(base: u64, data: Vec<u8>) -> Self {
        Self { base, data }
    }

    /// Load an image file (e.g. a dumped memory region)
    pub fn from_file<P: AsRef<Path>>(path: P, base: u64) -> Result<Self, MemoryError> {
        let data = std::fs::read(path.as_ref()).map_err(|e| MemoryError::ImageLoad {
            path: path.as_ref().display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(base, data))
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Overwrite bytes at an absolute address (clipped to the image)
    pub fn write(&mut self, address: u64, bytes: &[u8]) {
        let Some(start) = address.checked_sub(self.base) else {
            return;
        };
        let start = start as usize;
        if start >= self.data.len() {
            return;
        }
        let end = (start + bytes.len()).min(self.data.len());
        self.data[start..end].copy_from_slice(&bytes[..end - start]);
    }
}

impl MemoryReader for ImageMemory {
    fn read(&mut self, address: u64, buffer: &mut [u8]) -> Result<usize, MemoryError> {
        buffer.fill(0);
        let image_end = self.base + self.data.len() as u64;
        let read_end = address.saturating_add(buffer.len() as u64);
        let start = address.max(self.base);
        let end = read_end.min(image_end);
        if start >= end {
            return Err(MemoryError::OutOfRange {
                address,
                size: buffer.len(),
            });
        }

        let src = &self.data[(start - self.base) as usize..(end - self.base) as usize];
        let dst_start = (start - address) as usize;
        buffer[dst_start..dst_start + src.len()].copy_from_slice(src);
        Ok(src.len())
    }
}

/// Reader over the address space of a live process
pub struct ProcessMemory {
    /// Target process handle
    #[cfg(target_os = "windows")]
    process_handle: Option<isize>,

    #[cfg(not(target_os = "windows"))]
    target_pid: Option<u32>,
}

impl ProcessMemory {
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "windows")]
            process_handle: None,
            #[cfg(not(target_os = "windows"))]
            target_pid: None,
        }
    }

    /// Open a process for memory reads
    #[cfg(target_os = "windows")]
    pub fn open(pid: u32) -> Result<Self, MemoryError> {
        use windows::Win32::System::Threading::{
            OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ,
        };

        let handle = unsafe {
            OpenProcess(PROCESS_VM_READ | PROCESS_QUERY_INFORMATION, false, pid).map_err(
                |e| MemoryError::ReadFailed {
                    address: 0,
                    reason: e.to_string(),
                },
            )?
        };

        Ok(Self {
            process_handle: Some(handle.0 as isize),
        })
    }

    #[cfg(not(target_os = "windows"))]
    pub fn open(pid: u32) -> Result<Self, MemoryError> {
        Ok(Self {
            target_pid: Some(pid),
        })
    }
}

impl Default for ProcessMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryReader for ProcessMemory {
    fn read(&mut self, address: u64, buffer: &mut [u8]) -> Result<usize, MemoryError> {
        #[cfg(target_os = "windows")]
        {
            self.read_windows(address, buffer)
        }

        #[cfg(not(target_os = "windows"))]
        {
            self.read_procfs(address, buffer)
        }
    }
}

// Windows-specific implementations
#[cfg(target_os = "windows")]
impl ProcessMemory {
    fn read_windows(&self, address: u64, buffer: &mut [u8]) -> Result<usize, MemoryError> {
        use windows::Win32::Foundation::HANDLE;
        use windows::Win32::System::Diagnostics::Debug::ReadProcessMemory;

        let handle_val = self.process_handle.ok_or(MemoryError::NoProcess)?;
        let handle = HANDLE(handle_val);
        let mut bytes_read = 0usize;

        unsafe {
            ReadProcessMemory(
                handle,
                address as *const std::ffi::c_void,
                buffer.as_mut_ptr() as *mut std::ffi::c_void,
                buffer.len(),
                Some(&mut bytes_read),
            )
            .map_err(|e| MemoryError::ReadFailed {
                address,
                reason: e.to_string(),
            })?;
        }

        Ok(bytes_read)
    }
}

#[cfg(target_os = "windows")]
impl Drop for ProcessMemory {
    fn drop(&mut self) {
        use windows::Win32::Foundation::{CloseHandle, HANDLE};

        if let Some(handle_val) = self.process_handle.take() {
            unsafe {
                let _ = CloseHandle(HANDLE(handle_val));
            }
        }
    }
}

// /proc/<pid>/mem based implementation (Linux and friends)
#[cfg(not(target_os = "windows"))]
impl ProcessMemory {
    fn read_procfs(&self, address: u64, buffer: &mut [u8]) -> Result<usize, MemoryError> {
        use std::fs::File;
        use std::io::{Read, Seek, SeekFrom};

        let pid = self.target_pid.ok_or(MemoryError::NoProcess)?;
        let mem_path = format!("/proc/{}/mem", pid);

        let mut file = File::open(&mem_path).map_err(|e| MemoryError::ReadFailed {
            address,
            reason: e.to_string(),
        })?;

        file.seek(SeekFrom::Start(address))
            .map_err(|e| MemoryError::ReadFailed {
                address,
                reason: e.to_string(),
            })?;

        let bytes_read = file.read(buffer).map_err(|e| MemoryError::ReadFailed {
            address,
            reason: e.to_string(),
        })?;

        Ok(bytes_read)
    }
}
