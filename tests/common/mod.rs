//! テスト共通のヘルパー。
//!
//! シミュレータがない環境でもテストバイナリがリンクできるように、
//! ホストが提供する DPI / VPI のシンボルをここで定義します。
#![allow(dead_code)]

use std::ffi::CString;
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;
use std::sync::Mutex;

// --- テスト専用スタブ (シミュレータがない環境用) ---

/// `svOpenArrayHandle` の代わりに渡す、`int` の一次元 (または多次元を装う) 配列。
pub struct FakeOpenArray {
    pub dimensions: i32,
    pub left: i32,
    pub right: i32,
    pub data: Vec<i32>,
}

impl FakeOpenArray {
    /// `int a[0:len-1]` 相当。
    pub fn zero_based(len: usize, fill: i32) -> Self {
        Self {
            dimensions: 1,
            left: 0,
            right: len as i32 - 1,
            data: vec![fill; len],
        }
    }

    pub fn handle(&mut self) -> *mut c_void {
        (self as *mut Self).cast()
    }
}

unsafe fn fake<'a>(h: *mut c_void) -> &'a mut FakeOpenArray {
    unsafe { &mut *h.cast::<FakeOpenArray>() }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn svDimensions(h: *mut c_void) -> c_int {
    unsafe { fake(h) }.dimensions
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn svSizeOfArray(h: *mut c_void) -> c_int {
    (unsafe { fake(h) }.data.len() * std::mem::size_of::<i32>()) as c_int
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn svLeft(h: *mut c_void, _d: c_int) -> c_int {
    unsafe { fake(h) }.left
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn svRight(h: *mut c_void, _d: c_int) -> c_int {
    unsafe { fake(h) }.right
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn svGetArrElemPtr1(h: *mut c_void, indx1: c_int) -> *mut c_void {
    let array = unsafe { fake(h) };
    let low = array.left.min(array.right);
    match usize::try_from(indx1 - low) {
        Ok(i) if i < array.data.len() => array.data[i..].as_mut_ptr().cast(),
        _ => ptr::null_mut(),
    }
}

/// `vpi_get_vlog_info` が返す内容。アドレスは整数で保持します。
struct VlogInfoStub {
    product: usize,
    version: usize,
    argv: usize,
}

static VLOG_INFO: Mutex<Option<VlogInfoStub>> = Mutex::new(None);

/// `vpi_get_vlog_info` のスタブが返す値を設定します。`None` なら呼び出しは失敗します。
pub fn set_vlog_info(info: Option<(&'static CString, &'static CString, &'static TestArgv)>) {
    let stub = info.map(|(product, version, argv)| VlogInfoStub {
        product: product.as_ptr().expose_provenance(),
        version: version.as_ptr().expose_provenance(),
        argv: argv.root().expose_provenance(),
    });
    *VLOG_INFO.lock().unwrap() = stub;
}

#[repr(C)]
pub struct VlogInfoOut {
    argc: i32,
    argv: *mut *mut c_char,
    product: *mut c_char,
    version: *mut c_char,
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn vpi_get_vlog_info(out: *mut VlogInfoOut) -> i32 {
    let guard = VLOG_INFO.lock().unwrap();
    let Some(stub) = guard.as_ref() else {
        return 0;
    };
    unsafe {
        (*out).argc = 0;
        (*out).argv = ptr::with_exposed_provenance_mut(stub.argv);
        (*out).product = ptr::with_exposed_provenance_mut(stub.product);
        (*out).version = ptr::with_exposed_provenance_mut(stub.version);
    }
    1
}

// --- 引数配列の組み立て ---

/// テスト用の引数の記述。
pub enum Arg {
    Plain(&'static str),
    /// `flag` (`-f` / `-F`) に続けて、先頭が `label` の入れ子配列。
    File {
        flag: &'static str,
        label: &'static str,
        args: Vec<Arg>,
    },
    /// `flag` に続けて、要素のない入れ子配列 (先頭が番兵)。
    EmptyFile(&'static str),
    /// `flag` に続けて null ポインタ。
    Dangling(&'static str),
}

pub fn plain(s: &'static str) -> Arg {
    Arg::Plain(s)
}

pub fn file(label: &'static str, args: Vec<Arg>) -> Arg {
    Arg::File {
        flag: "-f",
        label,
        args,
    }
}

/// ホストが返すのと同じ形の、NULL 終端の `char*` 配列の木を所有します。
pub struct TestArgv {
    strings: Vec<CString>,
    vectors: Vec<Vec<*const c_char>>,
    root: *const *const c_char,
}

// 中身は構築後に変更しないので、static に置いてスレッド間で共有しても問題ありません。
unsafe impl Send for TestArgv {}
unsafe impl Sync for TestArgv {}

impl TestArgv {
    pub fn new(args: Vec<Arg>) -> Self {
        let mut argv = TestArgv {
            strings: Vec::new(),
            vectors: Vec::new(),
            root: ptr::null(),
        };
        argv.root = argv.push_vector(None, &args);
        argv
    }

    pub fn root(&self) -> *const *const c_char {
        self.root
    }

    fn intern(&mut self, s: &str) -> *const c_char {
        let owned = CString::new(s).unwrap();
        let p = owned.as_ptr();
        self.strings.push(owned);
        p
    }

    fn push_vector(&mut self, label: Option<&str>, args: &[Arg]) -> *const *const c_char {
        let mut vector = Vec::new();
        if let Some(label) = label {
            vector.push(self.intern(label));
        }
        for arg in args {
            match arg {
                Arg::Plain(s) => vector.push(self.intern(s)),
                Arg::File { flag, label, args } => {
                    vector.push(self.intern(flag));
                    let nested = self.push_vector(Some(label), args);
                    vector.push(nested.cast());
                }
                Arg::EmptyFile(flag) => {
                    vector.push(self.intern(flag));
                    let nested = self.push_vector(None, &[]);
                    vector.push(nested.cast());
                }
                Arg::Dangling(flag) => {
                    vector.push(self.intern(flag));
                    vector.push(ptr::null());
                }
            }
        }
        vector.push(ptr::null());
        let p = vector.as_ptr();
        self.vectors.push(vector);
        p
    }
}

/// `depth` 段の `-f` の入れ子の一番内側に `leaf` を置いた引数列。
pub fn nested(depth: usize, leaf: &'static str) -> Vec<Arg> {
    let mut args = vec![plain(leaf)];
    for _ in 0..depth {
        args = vec![file("nested.f", args)];
    }
    args
}
