use std::ffi::CStr;
use std::os::raw::{c_char, c_void};
use std::os::unix::ffi::OsStrExt;
use std::ptr;

use super::{OpenArray, cstr_arg, report, vlog_info};
use crate::args::argument_flatten_next;
use crate::bindings::svOpenArrayHandle;
use crate::collection::{Handle, collection_next_raw, glob_start};
use crate::error::SvlibError;
use crate::matcher::{
    MatchError, RegexOptions, ShapeError, regex_error_message, regex_run, validate_slots,
};
use crate::os::{self, AccessMode, STAT_FIELD_COUNT, TIME_FIELD_COUNT};
use crate::scratch::with_scratch;

/// エラーの説明文をスクラッチバッファに書き込み、そのポインタを返します。
fn scratch_message(err: &SvlibError) -> *const c_char {
    with_scratch(|s| {
        s.write_str(&err.to_string())
            .map_or(ptr::null(), CStr::as_ptr)
    })
}

/// コレクションから次の文字列を取り出します。
///
/// 使い切ると `*s` が null になり、`*h` も null に戻されます。
/// `*h` が null なら何もしません。無効なハンドルは `EBADF` です。
///
/// # Safety
/// `h` と `s` は書き込み可能なポインタでなければなりません。
#[unsafe(no_mangle)]
pub unsafe extern "C" fn svlib_dpi_imported_saBufNext(
    h: *mut *mut c_void,
    s: *mut *const c_char,
) -> i32 {
    if h.is_null() || s.is_null() {
        return libc::EINVAL;
    }
    unsafe { *s = ptr::null() };
    let mut handle = Handle::from_raw(unsafe { *h });
    match collection_next_raw(&mut handle) {
        Ok(next) => {
            unsafe {
                *s = next;
                *h = handle.map_or(ptr::null_mut(), Handle::into_raw);
            }
            0
        }
        Err(e) => {
            report("saBufNext", &e);
            e.code()
        }
    }
}

/// グロブを開始し、ハンドルと一致したパスの数を返します。
///
/// # Safety
/// `pattern` は NUL 終端文字列、`h` と `number` は書き込み可能なポインタでなければなりません。
#[unsafe(no_mangle)]
pub unsafe extern "C" fn svlib_dpi_imported_globStart(
    pattern: *const c_char,
    h: *mut *mut c_void,
    number: *mut u32,
) -> i32 {
    if h.is_null() || number.is_null() {
        return libc::EINVAL;
    }
    unsafe {
        *h = ptr::null_mut();
        *number = 0;
    }
    match unsafe { cstr_arg(pattern) }.and_then(glob_start) {
        Ok((handle, count)) => {
            unsafe {
                *h = handle.map_or(ptr::null_mut(), Handle::into_raw);
                *number = count;
            }
            0
        }
        Err(e) => e.code(),
    }
}

/// シミュレータの製品名・バージョンと、引数配列のハンドルを返します。失敗すると null。
///
/// # Safety
/// `product` と `version` は書き込み可能なポインタでなければなりません。
#[unsafe(no_mangle)]
pub unsafe extern "C" fn svlib_dpi_imported_getVlogInfo(
    product: *mut *const c_char,
    version: *mut *const c_char,
) -> *mut c_void {
    if product.is_null() || version.is_null() {
        return ptr::null_mut();
    }
    unsafe {
        *product = ptr::null();
        *version = ptr::null();
    }
    match vlog_info() {
        Some(info) => {
            unsafe {
                *product = info.product;
                *version = info.version;
            }
            info.argv as *mut c_void
        }
        None => ptr::null_mut(),
    }
}

/// 平坦化した引数列から次の引数を返します。終わると null を返し、`*info_argv` を null にします。
///
/// # Safety
/// `*info_argv` は `svlib_dpi_imported_getVlogInfo` が返した引数配列でなければなりません。
#[unsafe(no_mangle)]
pub unsafe extern "C" fn svlib_dpi_imported_getVlogInfoNext(
    info_argv: *mut *mut c_void,
) -> *const c_char {
    if info_argv.is_null() {
        return ptr::null();
    }
    let mut vector = unsafe { *info_argv } as *const *const c_char;
    let result = unsafe { argument_flatten_next(&mut vector) };
    unsafe { *info_argv = vector as *mut c_void };
    match result {
        Ok(Some(arg)) => arg.as_ptr(),
        Ok(None) => ptr::null(),
        Err(e) => {
            report("getVlogInfoNext", &e);
            ptr::null()
        }
    }
}

/// エラー番号に対応するシステムのメッセージ。
#[unsafe(no_mangle)]
pub extern "C" fn svlib_dpi_imported_getCErrStr(errnum: i32) -> *const c_char {
    with_scratch(|s| os::error_string_in(s, errnum).map_or(ptr::null(), CStr::as_ptr))
}

/// # Safety
/// `p_result` は書き込み可能なポインタでなければなりません。
#[unsafe(no_mangle)]
pub unsafe extern "C" fn svlib_dpi_imported_getcwd(p_result: *mut *const c_char) -> i32 {
    if p_result.is_null() {
        return libc::EINVAL;
    }
    match with_scratch(|s| os::getcwd_in(s).map(CStr::as_ptr)) {
        Ok(cwd) => {
            unsafe { *p_result = cwd };
            0
        }
        Err(e) => {
            unsafe { *p_result = scratch_message(&e) };
            e.code()
        }
    }
}

/// 環境変数を取得します。設定されていなければ `*p_result` を null にして 1 を返します。
///
/// # Safety
/// `env_var` は NUL 終端文字列、`p_result` は書き込み可能なポインタでなければなりません。
#[unsafe(no_mangle)]
pub unsafe extern "C" fn svlib_dpi_imported_getenv(
    env_var: *const c_char,
    p_result: *mut *const c_char,
) -> i32 {
    if p_result.is_null() {
        return libc::EINVAL;
    }
    unsafe { *p_result = ptr::null() };
    let name = match unsafe { cstr_arg(env_var) } {
        Ok(name) => name,
        Err(e) => return e.code(),
    };
    let Some(value) = os::getenv(std::ffi::OsStr::from_bytes(name.to_bytes())) else {
        return 1;
    };
    match with_scratch(|s| s.write_bytes(value.as_bytes()).map(CStr::as_ptr)) {
        Ok(v) => {
            unsafe { *p_result = v };
            0
        }
        Err(e) => e.code(),
    }
}

/// # Safety
/// `time_items` は `TIME_FIELD_COUNT` 個の `int` を書き込める領域を指していなければなりません。
#[unsafe(no_mangle)]
pub unsafe extern "C" fn svlib_dpi_imported_localTime(epoch_seconds: i64, time_items: *mut i32) -> i32 {
    if time_items.is_null() {
        return libc::EINVAL;
    }
    match os::local_time(epoch_seconds) {
        Ok(items) => {
            unsafe { ptr::copy_nonoverlapping(items.as_ptr(), time_items, TIME_FIELD_COUNT) };
            0
        }
        Err(e) => e.code(),
    }
}

/// # Safety
/// `format` は NUL 終端文字列、`formatted` は書き込み可能なポインタでなければなりません。
#[unsafe(no_mangle)]
pub unsafe extern "C" fn svlib_dpi_imported_timeFormat(
    epoch_seconds: i64,
    format: *const c_char,
    formatted: *mut *const c_char,
) -> i32 {
    if formatted.is_null() {
        return libc::EINVAL;
    }
    let result = unsafe { cstr_arg(format) }.and_then(|f| {
        with_scratch(|s| os::time_format_in(s, epoch_seconds, f).map(CStr::as_ptr))
    });
    match result {
        Ok(text) => {
            unsafe { *formatted = text };
            0
        }
        Err(e) => {
            unsafe { *formatted = scratch_message(&e) };
            e.code()
        }
    }
}

/// # Safety
/// `time_st` は書き込み可能なポインタでなければなりません。
#[unsafe(no_mangle)]
pub unsafe extern "C" fn svlib_dpi_imported_timeFormatST(
    epoch_seconds: i64,
    time_st: *mut *const c_char,
) -> i32 {
    if time_st.is_null() {
        return libc::EINVAL;
    }
    let result = os::stardate(epoch_seconds)
        .and_then(|text| with_scratch(|s| s.write_str(&text).map(CStr::as_ptr)));
    match result {
        Ok(text) => {
            unsafe { *time_st = text };
            0
        }
        Err(e) => {
            unsafe { *time_st = c"".as_ptr() };
            e.code()
        }
    }
}

/// # Safety
/// `path` は NUL 終端文字列、`stats` は `STAT_FIELD_COUNT` 個の `longint` を書き込める領域を
/// 指していなければなりません。
#[unsafe(no_mangle)]
pub unsafe extern "C" fn svlib_dpi_imported_fileStat(
    path: *const c_char,
    as_link: i32,
    stats: *mut i64,
) -> i32 {
    if stats.is_null() {
        return libc::EINVAL;
    }
    match unsafe { cstr_arg(path) }.and_then(|p| os::file_stat(p, as_link != 0)) {
        Ok(values) => {
            unsafe { ptr::copy_nonoverlapping(values.as_ptr(), stats, STAT_FIELD_COUNT) };
            0
        }
        Err(e) => e.code(),
    }
}

/// # Safety
/// `seconds` と `nanoseconds` は書き込み可能なポインタでなければなりません。
#[unsafe(no_mangle)]
pub unsafe extern "C" fn svlib_dpi_imported_hiResTime(
    get_resolution: i32,
    seconds: *mut i64,
    nanoseconds: *mut i64,
) {
    if seconds.is_null() || nanoseconds.is_null() {
        return;
    }
    let (s, ns) = os::hi_res_time(get_resolution != 0);
    unsafe {
        *seconds = s;
        *nanoseconds = ns;
    }
}

/// パターンのコンパイルエラーの説明文。コンパイルできるパターンなら null。
///
/// `err` はホストが受け取ったエラー番号ですが、説明文はパターンを再コンパイルして作ります。
///
/// # Safety
/// `re` は NUL 終端文字列でなければなりません。
#[unsafe(no_mangle)]
pub unsafe extern "C" fn svlib_dpi_imported_regexErrorString(
    _err: i32,
    re: *const c_char,
) -> *const c_char {
    let Ok(pattern) = (unsafe { cstr_arg(re) }) else {
        return ptr::null();
    };
    match regex_error_message(pattern.to_bytes()) {
        Some(message) => with_scratch(|s| s.write_str(&message).map_or(ptr::null(), CStr::as_ptr)),
        None => ptr::null(),
    }
}

/// 正規表現を実行し、サブマッチの位置を `match_list` に書き込みます。
///
/// 戻り値は 0 (一致・不一致とも)、配列の形が不正なら -1、コンパイルエラーなら `REG_*` 番号。
/// `*match_count` は一致した場合 `1 + グループ数`、それ以外は 0 です。
///
/// # Safety
/// `re` と `text` は NUL 終端文字列、`match_count` は書き込み可能なポインタ、
/// `match_list` は `int` のオープン配列でなければなりません。
#[unsafe(no_mangle)]
pub unsafe extern "C" fn svlib_dpi_imported_regexRun(
    re: *const c_char,
    text: *const c_char,
    options: i32,
    start_pos: i32,
    match_count: *mut i32,
    match_list: svOpenArrayHandle,
) -> i32 {
    if match_count.is_null() {
        return libc::EINVAL;
    }
    unsafe { *match_count = 0 };
    let Some(mut slots) = (unsafe { OpenArray::new(match_list) }) else {
        report("regexRun", &ShapeError::Dimensions(0));
        return MatchError::Shape(ShapeError::Dimensions(0)).code();
    };
    // 配列の形の検証は文字列引数の検証より先
    if let Err(e) = validate_slots(&slots) {
        report("regexRun", &e);
        return MatchError::Shape(e).code();
    }
    let (pattern, subject) = match unsafe { (cstr_arg(re), cstr_arg(text)) } {
        (Ok(p), Ok(s)) => (p, s),
        (Err(e), _) | (_, Err(e)) => return e.code(),
    };
    let result = regex_run(
        pattern.to_bytes(),
        subject.to_bytes(),
        RegexOptions::from_bits(options),
        start_pos,
        &mut slots,
    );
    match result {
        Ok(count) => {
            unsafe { *match_count = i32::try_from(count).unwrap_or(i32::MAX) };
            0
        }
        Err(e) => {
            if matches!(e, MatchError::Shape(_)) {
                report("regexRun", &e);
            }
            e.code()
        }
    }
}

/// `path` に `mode` のアクセスができるかを `*ok` に書き込みます。
///
/// # Safety
/// `path` は NUL 終端文字列、`ok` は書き込み可能なポインタでなければなりません。
#[unsafe(no_mangle)]
pub unsafe extern "C" fn svlib_dpi_imported_access(
    path: *const c_char,
    mode: i32,
    ok: *mut i32,
) -> i32 {
    if ok.is_null() {
        return libc::EINVAL;
    }
    unsafe { *ok = 0 };
    match unsafe { cstr_arg(path) }.and_then(|p| os::access(p, AccessMode::from_bits(mode))) {
        Ok(allowed) => {
            unsafe { *ok = i32::from(allowed) };
            0
        }
        Err(e) => e.code(),
    }
}
