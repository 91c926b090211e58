//! クレート全体のエラー型と、境界で返すステータスコードへの変換。
//!
//! 境界を越えられるのは整数だけなので、すべてのエラーは最終的に `code()` で
//! プラットフォームのエラー番号 (または検証エラーを表す負の値) に落とされます。
use std::io;
use thiserror::Error;

use crate::collection::CollectionError;

#[derive(Debug, Error)]
pub enum SvlibError {
    #[error("out of memory")]
    OutOfMemory,
    #[error("access denied")]
    AccessDenied,
    #[error("unsupported result from the underlying call")]
    Unsupported,
    #[error("result exceeds maximum buffer length {limit}")]
    ResultTooLong { limit: usize },
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error(transparent)]
    Os(#[from] io::Error),
    #[error(transparent)]
    Collection(#[from] CollectionError),
}

/// クレート内の操作結果を示す型エイリアス。
pub type SvlibResult<T> = Result<T, SvlibError>;

impl SvlibError {
    /// 境界で返すステータスコード。
    ///
    /// OS のエラーは errno をそのまま返し、それ以外は対応する errno 定数に割り当てます。
    pub fn code(&self) -> i32 {
        match self {
            SvlibError::OutOfMemory => libc::ENOMEM,
            SvlibError::AccessDenied => libc::EACCES,
            SvlibError::Unsupported => libc::ENOTSUP,
            SvlibError::ResultTooLong { .. } => libc::ERANGE,
            SvlibError::InvalidArgument(_) => libc::EINVAL,
            SvlibError::Os(e) => e.raw_os_error().unwrap_or(libc::EIO),
            SvlibError::Collection(e) => e.code(),
        }
    }

    /// 直前の OS 呼び出しが設定した errno からエラーを作ります。
    pub(crate) fn last_os_error() -> Self {
        SvlibError::Os(io::Error::last_os_error())
    }

    pub(crate) fn from_errno(errno: i32) -> Self {
        SvlibError::Os(io::Error::from_raw_os_error(errno))
    }
}
