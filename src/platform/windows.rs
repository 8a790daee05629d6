extern crate winapi;

use super::IdentityProvider;
use crate::error::{Error, Result};
use crate::model::IdentityKey;
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use std::ptr;
use winapi::um::fileapi::OPEN_EXISTING;
use winapi::um::fileapi::{CreateFileW, GetFileInformationByHandle, BY_HANDLE_FILE_INFORMATION};
use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
use winapi::um::winnt::{
    FILE_ATTRIBUTE_NORMAL, FILE_SHARE_DELETE, FILE_SHARE_READ, FILE_SHARE_WRITE,
};

/// NTFS file index + volume serial number.
#[derive(Debug, Default)]
pub struct NtfsIdentityProvider;

impl IdentityProvider for NtfsIdentityProvider {
    fn identity_of(&self, path: &Path) -> Result<IdentityKey> {
        let (volume_serial, file_index) = get_win_file_id(path)?;
        Ok(IdentityKey::new(file_index, volume_serial as u64))
    }
}

fn get_win_file_id(file_path: &Path) -> Result<(u32, u64)> {
    let file_path_wide: Vec<u16> = file_path
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();

    unsafe {
        let handle = CreateFileW(
            file_path_wide.as_ptr(),
            0,
            FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE,
            ptr::null_mut(),
            OPEN_EXISTING,
            FILE_ATTRIBUTE_NORMAL,
            ptr::null_mut(),
        );

        if handle == INVALID_HANDLE_VALUE || handle.is_null() {
            return Err(Error::identity_unavailable(
                file_path,
                format!("failed to open file: {}", std::io::Error::last_os_error()),
            ));
        }

        let mut file_info: BY_HANDLE_FILE_INFORMATION = std::mem::zeroed();
        if GetFileInformationByHandle(handle, &mut file_info) == 0 {
            let err = std::io::Error::last_os_error();
            CloseHandle(handle);
            return Err(Error::identity_unavailable(
                file_path,
                format!("failed to get file information: {}", err),
            ));
        }

        CloseHandle(handle);

        let file_index =
            ((file_info.nFileIndexHigh as u64) << 32) | file_info.nFileIndexLow as u64;

        Ok((file_info.dwVolumeSerialNumber, file_index))
    }
}
