//! このモジュールは、OS のプリミティブを一回呼び出すだけの補助的なラッパーを提供します。
//!
//! 長さが不定の文字列を返すもの (`getcwd`、時刻の書式化、エラーメッセージ) は
//! スクラッチバッファに書き込み、バッファが足りなければ上限まで伸長して再試行します。
//! OS のエラー番号は変換せずにそのまま返します。
use std::ffi::{CStr, OsStr, OsString};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use crate::error::{SvlibError, SvlibResult};
use crate::scratch::{Fill, ScratchBuffer};

/// `file_stat` が返す配列の添字。
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatField {
    Mtime,
    Atime,
    Ctime,
    Uid,
    Gid,
    Size,
    Mode,
}

pub const STAT_FIELD_COUNT: usize = 7;

/// `local_time` が返す配列の添字。値の意味は `struct tm` と同じです。
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeField {
    Sec,
    Min,
    Hour,
    Mday,
    Mon,
    Year,
    Wday,
    Yday,
    Isdst,
    /// うるう年かどうか (`year + 1900` から計算)。
    IsLeapYear,
}

pub const TIME_FIELD_COUNT: usize = 10;

/// `access` で確認するアクセスの種類のビットマップ。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccessMode(i32);

impl AccessMode {
    pub const EXISTS: AccessMode = AccessMode(0);
    pub const READ: AccessMode = AccessMode(4);
    pub const WRITE: AccessMode = AccessMode(2);
    pub const EXEC: AccessMode = AccessMode(1);

    pub fn from_bits(bits: i32) -> Self {
        AccessMode(bits & 7)
    }

    fn to_libc(self) -> libc::c_int {
        if self.0 == 0 {
            return libc::F_OK;
        }
        let mut flag = 0;
        if self.0 & Self::READ.0 != 0 {
            flag |= libc::R_OK;
        }
        if self.0 & Self::WRITE.0 != 0 {
            flag |= libc::W_OK;
        }
        if self.0 & Self::EXEC.0 != 0 {
            flag |= libc::X_OK;
        }
        flag
    }
}

impl std::ops::BitOr for AccessMode {
    type Output = AccessMode;

    fn bitor(self, rhs: AccessMode) -> AccessMode {
        AccessMode(self.0 | rhs.0)
    }
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn c_path(path: &CStr) -> &Path {
    Path::new(OsStr::from_bytes(path.to_bytes()))
}

/// カレントディレクトリをスクラッチバッファに書き込みます。
pub fn getcwd_in(scratch: &mut ScratchBuffer) -> SvlibResult<&CStr> {
    scratch.write_with_retry(|buf| {
        let p = unsafe { libc::getcwd(buf.as_mut_ptr().cast(), buf.len()) };
        if !p.is_null() {
            let n = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
            return Ok(Fill::Done(n));
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ERANGE) {
            Ok(Fill::Truncated)
        } else {
            Err(err.into())
        }
    })
}

/// 環境変数を取得します。設定されていなければ `None`。
pub fn getenv(name: &OsStr) -> Option<OsString> {
    std::env::var_os(name)
}

/// `path` に `mode` のアクセスができるかを返します。
///
/// 権限がない (`EACCES`) ・読み取り専用 (`EROFS`) は `Ok(false)` です。
/// `EXISTS` の確認では、存在しない (`ENOENT`) ことも `Ok(false)` として返します。
pub fn access(path: &CStr, mode: AccessMode) -> SvlibResult<bool> {
    let rc = unsafe { libc::access(path.as_ptr(), mode.to_libc()) };
    if rc == 0 {
        return Ok(true);
    }
    match io::Error::last_os_error().raw_os_error() {
        Some(libc::EACCES) | Some(libc::EROFS) => Ok(false),
        Some(libc::ENOENT) if mode == AccessMode::EXISTS => Ok(false),
        Some(errno) => Err(SvlibError::from_errno(errno)),
        None => Err(SvlibError::last_os_error()),
    }
}

/// ファイルの属性を `StatField` の順に返します。
/// `as_link` が真ならシンボリックリンク自体の属性を返します。
pub fn file_stat(path: &CStr, as_link: bool) -> SvlibResult<[i64; STAT_FIELD_COUNT]> {
    let path = c_path(path);
    let meta = if as_link {
        std::fs::symlink_metadata(path)?
    } else {
        std::fs::metadata(path)?
    };
    let mut stats = [0i64; STAT_FIELD_COUNT];
    stats[StatField::Mtime as usize] = meta.mtime();
    stats[StatField::Atime as usize] = meta.atime();
    stats[StatField::Ctime as usize] = meta.ctime();
    stats[StatField::Uid as usize] = i64::from(meta.uid());
    stats[StatField::Gid as usize] = i64::from(meta.gid());
    stats[StatField::Size as usize] = i64::try_from(meta.size()).unwrap_or(i64::MAX);
    stats[StatField::Mode as usize] = i64::from(meta.mode());
    Ok(stats)
}

fn broken_down(epoch_seconds: i64) -> SvlibResult<libc::tm> {
    let t = epoch_seconds as libc::time_t;
    let mut parts: libc::tm = unsafe { std::mem::zeroed() };
    let p = unsafe { libc::localtime_r(&t, &mut parts) };
    if p.is_null() {
        return Err(SvlibError::last_os_error());
    }
    Ok(parts)
}

/// エポック秒をローカル時刻に分解し、`TimeField` の順に返します。
pub fn local_time(epoch_seconds: i64) -> SvlibResult<[i32; TIME_FIELD_COUNT]> {
    let tm = broken_down(epoch_seconds)?;
    let mut items = [0i32; TIME_FIELD_COUNT];
    items[TimeField::Sec as usize] = tm.tm_sec;
    items[TimeField::Min as usize] = tm.tm_min;
    items[TimeField::Hour as usize] = tm.tm_hour;
    items[TimeField::Mday as usize] = tm.tm_mday;
    items[TimeField::Mon as usize] = tm.tm_mon;
    items[TimeField::Year as usize] = tm.tm_year;
    items[TimeField::Wday as usize] = tm.tm_wday;
    items[TimeField::Yday as usize] = tm.tm_yday;
    items[TimeField::Isdst as usize] = tm.tm_isdst;
    items[TimeField::IsLeapYear as usize] = i32::from(is_leap_year(tm.tm_year + 1900));
    Ok(items)
}

/// `strftime(3)` の書式でローカル時刻を書式化し、スクラッチバッファに書き込みます。
///
/// 空の書式は空文字列になります。
pub fn time_format_in<'s>(
    scratch: &'s mut ScratchBuffer,
    epoch_seconds: i64,
    format: &CStr,
) -> SvlibResult<&'s CStr> {
    if format.is_empty() {
        return scratch.write_bytes(b"");
    }
    let tm = broken_down(epoch_seconds)?;
    scratch.write_with_retry(|buf| {
        let n = unsafe { libc::strftime(buf.as_mut_ptr().cast(), buf.len(), format.as_ptr(), &tm) };
        // 0 は「収まらなかった」の意味
        Ok(if n == 0 { Fill::Truncated } else { Fill::Done(n) })
    })
}

/// 宇宙暦 (`Stardate YYDDD.T`) 形式でローカル時刻を書式化します。
pub fn stardate(epoch_seconds: i64) -> SvlibResult<String> {
    let tm = broken_down(epoch_seconds)?;
    let days_in_year = 365 + i32::from(is_leap_year(tm.tm_year + 1900));
    Ok(format!(
        "Stardate {:2}{:03}.{:01}",
        tm.tm_year - 46,
        (tm.tm_yday * 1000) / days_in_year,
        (tm.tm_hour * 60 + tm.tm_min) / 144
    ))
}

/// `CLOCK_REALTIME` の現在時刻 (または分解能) を `(秒, ナノ秒)` で返します。
pub fn hi_res_time(resolution: bool) -> (i64, i64) {
    let mut t = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    unsafe {
        if resolution {
            libc::clock_getres(libc::CLOCK_REALTIME, &mut t);
        } else {
            libc::clock_gettime(libc::CLOCK_REALTIME, &mut t);
        }
    }
    (t.tv_sec as i64, t.tv_nsec as i64)
}

/// エラー番号に対応するシステムのメッセージをスクラッチバッファに書き込みます。
pub fn error_string_in(scratch: &mut ScratchBuffer, errnum: i32) -> SvlibResult<&CStr> {
    scratch.write_with_retry(|buf| {
        let rc = unsafe { libc::strerror_r(errnum, buf.as_mut_ptr().cast(), buf.len()) };
        let truncated = rc == libc::ERANGE
            || (rc == -1 && io::Error::last_os_error().raw_os_error() == Some(libc::ERANGE));
        if truncated {
            return Ok(Fill::Truncated);
        }
        // 未知の番号 (EINVAL) でも "Unknown error N" が書かれる
        match buf.iter().position(|&b| b == 0) {
            Some(n) => Ok(Fill::Done(n)),
            None => Ok(Fill::Truncated),
        }
    })
}
