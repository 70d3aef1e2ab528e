//! Process handle and memory reader for a live target process.
//!
//! Only Windows is supported as a target; on other platforms opening a
//! process fails with [`Error::ProcessOpenFailed`](crate::Error::ProcessOpenFailed).

use crate::error::Result;
use crate::memory::{MemoryRegion, QueryMemory, ReadMemory};

/// Executable name the CLI looks for when no pid is given.
pub const DEFAULT_PROCESS_NAME: &str = "javaw.exe";

/// Screen-space rectangle of a window's client area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// An open handle to a target process.
///
/// The raw handle is stored as an integer so the handle can move to the
/// reader thread; it is closed on drop.
#[derive(Debug)]
pub struct ProcessHandle {
    pub pid: u32,
    pub base_address: u64,
    pub name: String,
    raw: isize,
}

/// Reads the memory of the process behind a [`ProcessHandle`].
#[derive(Debug)]
pub struct MemoryReader {
    process: ProcessHandle,
}

impl MemoryReader {
    pub fn new(process: ProcessHandle) -> Self {
        Self { process }
    }

    pub fn process(&self) -> &ProcessHandle {
        &self.process
    }
}

impl ReadMemory for MemoryReader {
    fn read_into(&self, address: u64, buf: &mut [u8]) -> Result<usize> {
        sys::read(&self.process, address, buf)
    }
}

impl QueryMemory for MemoryReader {
    fn address_bounds(&self) -> (u64, u64) {
        sys::address_bounds()
    }

    fn query_region(&self, address: u64) -> Option<MemoryRegion> {
        sys::query(&self.process, address)
    }
}

impl ProcessHandle {
    /// Open a process by pid with read and query access.
    pub fn open(pid: u32) -> Result<Self> {
        sys::open(pid)
    }

    /// Open the first process whose executable name matches `name` (case-insensitive).
    pub fn find_and_open(name: &str) -> Result<Self> {
        let pid = sys::find_pid(name)?;
        Self::open(pid)
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        sys::close(self.raw);
    }
}

/// Client-area rectangle of the top-level window titled exactly `title`.
pub fn find_window_rect(title: &str) -> Result<WindowRect> {
    sys::find_window_rect(title)
}

#[cfg(target_os = "windows")]
mod sys {
    use std::ffi::c_void;
    use std::mem::size_of;

    use tracing::debug;
    use windows::Win32::Foundation::{CloseHandle, HANDLE, HWND, POINT, RECT};
    use windows::Win32::Graphics::Gdi::ClientToScreen;
    use windows::Win32::System::Diagnostics::Debug::ReadProcessMemory;
    use windows::Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, MODULEENTRY32W, Module32FirstW, PROCESSENTRY32W,
        Process32FirstW, Process32NextW, TH32CS_SNAPMODULE, TH32CS_SNAPMODULE32,
        TH32CS_SNAPPROCESS,
    };
    use windows::Win32::System::Memory::{MEM_COMMIT, MEMORY_BASIC_INFORMATION, VirtualQueryEx};
    use windows::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};
    use windows::Win32::System::Threading::{
        OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ,
    };
    use windows::Win32::UI::WindowsAndMessaging::{FindWindowW, GetClientRect};
    use windows::core::PCWSTR;

    use super::{ProcessHandle, WindowRect};
    use crate::error::{Error, Result};
    use crate::memory::{MemoryRegion, Protection};

    fn handle(process: &ProcessHandle) -> HANDLE {
        HANDLE(process.raw as *mut c_void)
    }

    fn wide_to_string(wide: &[u16]) -> String {
        let len = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
        String::from_utf16_lossy(&wide[..len])
    }

    pub fn open(pid: u32) -> Result<ProcessHandle> {
        let raw = unsafe { OpenProcess(PROCESS_VM_READ | PROCESS_QUERY_INFORMATION, false, pid) }
            .map_err(|e| Error::ProcessOpenFailed(format!("pid {}: {}", pid, e)))?;

        let (base_address, name) = main_module(pid).unwrap_or_default();
        debug!("Opened pid {} ({}) base 0x{:X}", pid, name, base_address);

        Ok(ProcessHandle {
            pid,
            base_address,
            name,
            raw: raw.0 as isize,
        })
    }

    fn main_module(pid: u32) -> Option<(u64, String)> {
        unsafe {
            let snapshot =
                CreateToolhelp32Snapshot(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, pid).ok()?;
            let mut entry = MODULEENTRY32W {
                dwSize: size_of::<MODULEENTRY32W>() as u32,
                ..Default::default()
            };
            let found = Module32FirstW(snapshot, &mut entry).is_ok();
            let _ = CloseHandle(snapshot);
            found.then(|| (entry.modBaseAddr as u64, wide_to_string(&entry.szModule)))
        }
    }

    pub fn find_pid(name: &str) -> Result<u32> {
        unsafe {
            let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0)
                .map_err(|e| Error::ProcessNotFound(format!("snapshot failed: {}", e)))?;
            let mut entry = PROCESSENTRY32W {
                dwSize: size_of::<PROCESSENTRY32W>() as u32,
                ..Default::default()
            };

            let mut found = None;
            if Process32FirstW(snapshot, &mut entry).is_ok() {
                loop {
                    if wide_to_string(&entry.szExeFile).eq_ignore_ascii_case(name) {
                        found = Some(entry.th32ProcessID);
                        break;
                    }
                    if Process32NextW(snapshot, &mut entry).is_err() {
                        break;
                    }
                }
            }
            let _ = CloseHandle(snapshot);

            found.ok_or_else(|| Error::ProcessNotFound(name.to_string()))
        }
    }

    pub fn close(raw: isize) {
        if raw != 0 {
            unsafe {
                let _ = CloseHandle(HANDLE(raw as *mut c_void));
            }
        }
    }

    pub fn read(process: &ProcessHandle, address: u64, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut bytes_read = 0usize;
        let result = unsafe {
            ReadProcessMemory(
                handle(process),
                address as *const c_void,
                buf.as_mut_ptr().cast(),
                buf.len(),
                Some(&mut bytes_read),
            )
        };

        match result {
            Ok(()) => Ok(bytes_read),
            // ERROR_PARTIAL_COPY still fills the readable prefix
            Err(_) if bytes_read > 0 => Ok(bytes_read),
            Err(e) => Err(Error::read_failed(address, e.to_string())),
        }
    }

    pub fn address_bounds() -> (u64, u64) {
        let mut info = SYSTEM_INFO::default();
        unsafe { GetSystemInfo(&mut info) };
        (
            info.lpMinimumApplicationAddress as u64,
            info.lpMaximumApplicationAddress as u64,
        )
    }

    pub fn query(process: &ProcessHandle, address: u64) -> Option<MemoryRegion> {
        let mut mbi = MEMORY_BASIC_INFORMATION::default();
        let written = unsafe {
            VirtualQueryEx(
                handle(process),
                Some(address as *const c_void),
                &mut mbi,
                size_of::<MEMORY_BASIC_INFORMATION>(),
            )
        };
        if written == 0 {
            return None;
        }

        let (protection, guard) = Protection::from_raw(mbi.Protect.0);
        Some(MemoryRegion {
            base: mbi.BaseAddress as u64,
            size: mbi.RegionSize as u64,
            committed: mbi.State == MEM_COMMIT,
            protection,
            guard,
        })
    }

    pub fn find_window_rect(title: &str) -> Result<WindowRect> {
        let wide: Vec<u16> = title.encode_utf16().chain(std::iter::once(0)).collect();
        unsafe {
            let hwnd: HWND = FindWindowW(PCWSTR::null(), PCWSTR(wide.as_ptr()))
                .map_err(|_| Error::WindowNotFound(title.to_string()))?;

            let mut rect = RECT::default();
            GetClientRect(hwnd, &mut rect).map_err(|e| Error::WindowNotFound(e.to_string()))?;

            let mut origin = POINT { x: 0, y: 0 };
            let _ = ClientToScreen(hwnd, &mut origin);

            Ok(WindowRect {
                x: origin.x,
                y: origin.y,
                width: rect.right - rect.left,
                height: rect.bottom - rect.top,
            })
        }
    }
}

#[cfg(not(target_os = "windows"))]
mod sys {
    use super::{ProcessHandle, WindowRect};
    use crate::error::{Error, Result};
    use crate::memory::MemoryRegion;

    const UNSUPPORTED: &str = "remote process access requires Windows";

    pub fn open(pid: u32) -> Result<ProcessHandle> {
        Err(Error::ProcessOpenFailed(format!("pid {}: {}", pid, UNSUPPORTED)))
    }

    pub fn find_pid(name: &str) -> Result<u32> {
        Err(Error::ProcessNotFound(format!("{}: {}", name, UNSUPPORTED)))
    }

    pub fn close(_raw: isize) {}

    pub fn read(_process: &ProcessHandle, address: u64, _buf: &mut [u8]) -> Result<usize> {
        Err(Error::read_failed(address, UNSUPPORTED))
    }

    pub fn address_bounds() -> (u64, u64) {
        (0, 0)
    }

    pub fn query(_process: &ProcessHandle, _address: u64) -> Option<MemoryRegion> {
        None
    }

    pub fn find_window_rect(title: &str) -> Result<WindowRect> {
        Err(Error::WindowNotFound(format!("{}: {}", title, UNSUPPORTED)))
    }
}

#[cfg(all(test, not(target_os = "windows")))]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_open_unsupported_platform() {
        let err = ProcessHandle::open(1234).unwrap_err();
        assert!(matches!(err, Error::ProcessOpenFailed(_)));
        assert!(ProcessHandle::find_and_open(DEFAULT_PROCESS_NAME).is_err());
        assert!(find_window_rect("Minecraft").is_err());
    }
}
