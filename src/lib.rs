//! `svlib-dpi` は SystemVerilog シミュレータに DPI-C で読み込まれる、ネイティブ側のサポートライブラリです。
//!
//! DPI の境界では整数・文字列・不透明なハンドルしか受け渡しできません。
//! このクレートは、その制約の下で長さが不定の結果をホストへ返す仕組みを提供します。
//!
//! 主な機能:
//! - 長さ不定の文字列結果のための共有スクラッチバッファ (`ScratchBuffer`)。
//! - 文字列配列を一要素ずつ取り出す遅延コレクション (`collection`、ファイル名グロブ)。
//! - 入れ子の `-f` 引数ファイルを一本の引数列にする平坦化 (`ArgFlattener`)。
//! - 呼び出し元の配列へサブマッチ位置を書き込む正規表現アダプタ (`regex_run`)。
//! - カレントディレクトリ・環境変数・ファイル属性・時刻などの補助的なラッパー (`os`)。
//! - 上記をシミュレータへ公開する `svlib_dpi_imported_*` 関数 (`dpi`、`dpi` フィーチャー)。
mod args;
mod collection;
mod error;
mod limits;
mod matcher;
pub mod os;
mod scratch;
pub use args::*;
pub use collection::*;
pub use error::*;
pub use limits::*;
pub use matcher::*;
pub use scratch::*;

/// シミュレータが提供する DPI/VPI の C シンボルの宣言。
#[cfg(feature = "dpi")]
#[doc(hidden)]
pub mod bindings;

/// シミュレータへ公開する extern "C" 関数。
#[cfg(feature = "dpi")]
pub mod dpi;
