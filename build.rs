use std::env;
use std::fs;
use std::path::Path;

fn main() {
    // エンジンDLLのソースディレクトリ
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => dir,
        Err(_) => return,
    };
    let engine_bin_dir = Path::new(&manifest_dir)
        .join("third_party")
        .join("gonhanh_core")
        .join("bin");

    // エンジンDLLディレクトリが存在するか確認
    if !engine_bin_dir.exists() {
        println!(
            "cargo:warning=Engine DLL directory not found: {} (gonhanh will run degraded without gonhanh_core.dll)",
            engine_bin_dir.display()
        );
        return;
    }

    // ビルドプロファイルに応じた出力ディレクトリを決定
    let out_dir = match env::var("OUT_DIR") {
        Ok(dir) => dir,
        Err(_) => return,
    };
    let target_dir = match Path::new(&out_dir)
        .ancestors()
        .nth(3) // OUT_DIR is target/<profile>/build/<pkg>/out, so go up 3 levels to target/<profile>
    {
        Some(dir) => dir.to_path_buf(),
        None => return,
    };

    // エンジンDLLをコピー
    let dll_path = engine_bin_dir.join("gonhanh_core.dll");
    if dll_path.exists() {
        let dst_path = target_dir.join("gonhanh_core.dll");

        // すでに同じサイズのファイルが存在する場合はスキップ
        if dst_path.exists() {
            if let (Ok(src_meta), Ok(dst_meta)) = (fs::metadata(&dll_path), fs::metadata(&dst_path))
            {
                if src_meta.len() == dst_meta.len() {
                    return;
                }
            }
        }

        match fs::copy(&dll_path, &dst_path) {
            Ok(_) => {
                println!(
                    "cargo:warning=Copied: gonhanh_core.dll -> {}",
                    dst_path.display()
                );
            }
            Err(e) => {
                println!("cargo:warning=Failed to copy engine DLL: {}", e);
            }
        }
    } else {
        println!(
            "cargo:warning=gonhanh_core.dll not found in {}",
            engine_bin_dir.display()
        );
    }

    println!("cargo:rerun-if-changed=third_party/gonhanh_core/bin");
}
