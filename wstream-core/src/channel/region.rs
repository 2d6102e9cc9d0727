//! Named shared-memory regions.
//!
//! Windows uses a pagefile-backed named file mapping
//! (`CreateFileMappingW` / `MapViewOfFile`); POSIX targets use
//! `shm_open` + `mmap`. The consumer side creates and owns the name, the
//! producer side only opens it.

use std::ptr::NonNull;

use crate::channel::header::{HEADER_SIZE, Header};
use crate::error::StreamError;

/// Map a channel name to the OS object name.
#[cfg(target_os = "windows")]
pub fn os_name(name: &str) -> String {
    format!("Local\\wstream.{name}")
}

/// Map a channel name to the OS object name.
#[cfg(not(target_os = "windows"))]
pub fn os_name(name: &str) -> String {
    format!("/wstream.{}", name.replace('/', "_"))
}

// ── SharedRegion ─────────────────────────────────────────────────

/// A mapped shared-memory region: [`HEADER_SIZE`] header bytes followed
/// by the payload.
///
/// Dropping the region unmaps it. Consumer-owned regions also remove the
/// name so a later create gets a fresh object.
pub struct SharedRegion {
    ptr: NonNull<u8>,
    len: usize,
    mapping: platform::Mapping,
}

// The mapping is plain memory; the raw pointer is only dereferenced through
// `&self` methods.
unsafe impl Send for SharedRegion {}

impl SharedRegion {
    /// Create (or replace) the region `os_name` with `len` bytes.
    pub fn create(os_name: &str, len: usize) -> Result<Self, StreamError> {
        if len < HEADER_SIZE {
            return Err(StreamError::ChannelUnavailable(format!(
                "region of {len} bytes cannot hold the header"
            )));
        }
        let (ptr, mapping) = platform::create(os_name, len)?;
        Ok(Self { ptr, len, mapping })
    }

    /// Map an existing region created by the consumer.
    pub fn open(os_name: &str) -> Result<Self, StreamError> {
        let (ptr, len, mapping) = platform::open(os_name)?;
        if len < HEADER_SIZE {
            drop(Self { ptr, len, mapping });
            return Err(StreamError::ProtocolMismatch("region smaller than header"));
        }
        Ok(Self { ptr, len, mapping })
    }

    /// Total mapped size, header included.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes available after the header.
    pub fn payload_capacity(&self) -> usize {
        self.len - HEADER_SIZE
    }

    pub fn header(&self) -> Header<'_> {
        // The mapping is page aligned and at least HEADER_SIZE long.
        unsafe { Header::from_ptr(self.ptr.as_ptr()) }
    }

    /// Start of the payload area.
    pub(crate) fn payload_ptr(&self) -> *mut u8 {
        unsafe { self.ptr.as_ptr().add(HEADER_SIZE) }
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        unsafe { self.mapping.release(self.ptr, self.len) };
    }
}

impl std::fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRegion")
            .field("len", &self.len)
            .field("header", &self.header())
            .finish()
    }
}

// ── Backends ─────────────────────────────────────────────────────

/// Creates regions for a [`SharedChannel`](crate::channel::SharedChannel).
pub trait RegionBackend {
    fn create(&mut self, os_name: &str, len: usize) -> Result<SharedRegion, StreamError>;
}

/// The real OS shared-memory backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsBackend;

impl RegionBackend for OsBackend {
    fn create(&mut self, os_name: &str, len: usize) -> Result<SharedRegion, StreamError> {
        SharedRegion::create(os_name, len)
    }
}

// ── Windows implementation ───────────────────────────────────────

#[cfg(target_os = "windows")]
mod platform {
    use std::ffi::c_void;
    use std::ptr::NonNull;

    use windows::Win32::Foundation::{BOOL, CloseHandle, HANDLE, INVALID_HANDLE_VALUE};
    use windows::Win32::System::Memory::{
        CreateFileMappingW, FILE_MAP_ALL_ACCESS, MEMORY_BASIC_INFORMATION,
        MEMORY_MAPPED_VIEW_ADDRESS, MapViewOfFile, OpenFileMappingW, PAGE_READWRITE,
        UnmapViewOfFile, VirtualQuery,
    };
    use windows::core::PCWSTR;

    use crate::error::StreamError;

    pub struct Mapping {
        handle: HANDLE,
    }

    fn wide(name: &str) -> Vec<u16> {
        name.encode_utf16().chain(std::iter::once(0)).collect()
    }

    pub fn create(name: &str, len: usize) -> Result<(NonNull<u8>, Mapping), StreamError> {
        let name_wide = wide(name);
        let size = len as u64;
        let handle = unsafe {
            CreateFileMappingW(
                INVALID_HANDLE_VALUE,
                None,
                PAGE_READWRITE,
                (size >> 32) as u32,
                size as u32,
                PCWSTR(name_wide.as_ptr()),
            )
        }
        .map_err(|e| StreamError::ChannelUnavailable(format!("CreateFileMappingW failed: {e}")))?;

        // An existing, smaller mapping still held by a producer makes this
        // fail; the caller retries once the producer lets go.
        let view = unsafe { MapViewOfFile(handle, FILE_MAP_ALL_ACCESS, 0, 0, len) };
        match NonNull::new(view.Value as *mut u8) {
            Some(ptr) => Ok((ptr, Mapping { handle })),
            None => {
                let err = windows::core::Error::from_win32();
                let _ = unsafe { CloseHandle(handle) };
                Err(StreamError::ChannelUnavailable(format!("MapViewOfFile failed: {err}")))
            }
        }
    }

    pub fn open(name: &str) -> Result<(NonNull<u8>, usize, Mapping), StreamError> {
        let name_wide = wide(name);
        let handle = unsafe {
            OpenFileMappingW(
                FILE_MAP_ALL_ACCESS.0,
                BOOL::from(false),
                PCWSTR(name_wide.as_ptr()),
            )
        }
        .map_err(|e| StreamError::ChannelUnavailable(format!("OpenFileMappingW failed: {e}")))?;

        let view = unsafe { MapViewOfFile(handle, FILE_MAP_ALL_ACCESS, 0, 0, 0) };
        let Some(ptr) = NonNull::new(view.Value as *mut u8) else {
            let err = windows::core::Error::from_win32();
            let _ = unsafe { CloseHandle(handle) };
            return Err(StreamError::ChannelUnavailable(format!("MapViewOfFile failed: {err}")));
        };

        let mut info = MEMORY_BASIC_INFORMATION::default();
        let written = unsafe {
            VirtualQuery(
                Some(ptr.as_ptr() as *const c_void),
                &mut info,
                std::mem::size_of::<MEMORY_BASIC_INFORMATION>(),
            )
        };
        let mapping = Mapping { handle };
        if written == 0 {
            unsafe { mapping.release(ptr, 0) };
            return Err(StreamError::ChannelUnavailable("VirtualQuery failed".into()));
        }
        Ok((ptr, info.RegionSize, mapping))
    }

    impl Mapping {
        /// # Safety
        ///
        /// `ptr` must be the view returned alongside this mapping.
        pub unsafe fn release(&self, ptr: NonNull<u8>, _len: usize) {
            let view = MEMORY_MAPPED_VIEW_ADDRESS {
                Value: ptr.as_ptr() as *mut c_void,
            };
            unsafe {
                let _ = UnmapViewOfFile(view);
                let _ = CloseHandle(self.handle);
            }
        }
    }
}

// ── POSIX implementation ─────────────────────────────────────────

#[cfg(unix)]
mod platform {
    use std::ffi::CString;
    use std::io;
    use std::ptr::{self, NonNull};

    use crate::error::StreamError;

    pub struct Mapping {
        fd: libc::c_int,
        name: CString,
        owner: bool,
    }

    fn c_name(name: &str) -> Result<CString, StreamError> {
        CString::new(name)
            .map_err(|_| StreamError::ChannelUnavailable("channel name contains NUL".into()))
    }

    fn unavailable(call: &str) -> StreamError {
        StreamError::ChannelUnavailable(format!("{call} failed: {}", io::Error::last_os_error()))
    }

    unsafe fn map(fd: libc::c_int, len: usize) -> Option<NonNull<u8>> {
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return None;
        }
        NonNull::new(ptr as *mut u8)
    }

    pub fn create(name: &str, len: usize) -> Result<(NonNull<u8>, Mapping), StreamError> {
        let name = c_name(name)?;
        let size = libc::off_t::try_from(len)
            .map_err(|_| StreamError::ChannelUnavailable(format!("region of {len} bytes")))?;

        // Stale objects from a crashed consumer are replaced, not reused.
        unsafe { libc::shm_unlink(name.as_ptr()) };
        let fd = unsafe {
            libc::shm_open(
                name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                0o600 as libc::c_uint,
            )
        };
        if fd < 0 {
            return Err(unavailable("shm_open"));
        }
        let mapping = Mapping {
            fd,
            name,
            owner: true,
        };

        if unsafe { libc::ftruncate(fd, size) } != 0 {
            let err = unavailable("ftruncate");
            unsafe { mapping.release_fd() };
            return Err(err);
        }
        match unsafe { map(fd, len) } {
            Some(ptr) => Ok((ptr, mapping)),
            None => {
                let err = unavailable("mmap");
                unsafe { mapping.release_fd() };
                Err(err)
            }
        }
    }

    pub fn open(name: &str) -> Result<(NonNull<u8>, usize, Mapping), StreamError> {
        let name = c_name(name)?;
        let fd = unsafe { libc::shm_open(name.as_ptr(), libc::O_RDWR, 0 as libc::c_uint) };
        if fd < 0 {
            return Err(unavailable("shm_open"));
        }
        let mapping = Mapping {
            fd,
            name,
            owner: false,
        };

        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        if unsafe { libc::fstat(fd, &mut stat) } != 0 {
            let err = unavailable("fstat");
            unsafe { mapping.release_fd() };
            return Err(err);
        }
        let len = stat.st_size as usize;
        if len == 0 {
            unsafe { mapping.release_fd() };
            return Err(StreamError::ChannelUnavailable("region is empty".into()));
        }
        match unsafe { map(fd, len) } {
            Some(ptr) => Ok((ptr, len, mapping)),
            None => {
                let err = unavailable("mmap");
                unsafe { mapping.release_fd() };
                Err(err)
            }
        }
    }

    impl Mapping {
        unsafe fn release_fd(&self) {
            unsafe {
                libc::close(self.fd);
                if self.owner {
                    libc::shm_unlink(self.name.as_ptr());
                }
            }
        }

        /// # Safety
        ///
        /// `ptr`/`len` must describe the mapping created alongside `self`.
        pub unsafe fn release(&self, ptr: NonNull<u8>, len: usize) {
            unsafe {
                libc::munmap(ptr.as_ptr() as *mut libc::c_void, len);
                self.release_fd();
            }
        }
    }
}

// ── Fallback stub ────────────────────────────────────────────────

#[cfg(not(any(unix, target_os = "windows")))]
mod platform {
    use std::ptr::NonNull;

    use crate::error::StreamError;

    pub struct Mapping;

    pub fn create(_name: &str, _len: usize) -> Result<(NonNull<u8>, Mapping), StreamError> {
        Err(StreamError::Unsupported("shared memory"))
    }

    pub fn open(_name: &str) -> Result<(NonNull<u8>, usize, Mapping), StreamError> {
        Err(StreamError::Unsupported("shared memory"))
    }

    impl Mapping {
        pub unsafe fn release(&self, _ptr: NonNull<u8>, _len: usize) {}
    }
}

// ── Tests ────────────────────────────────────────────────────────
