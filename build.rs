/// Build script for D3D Frame
///
/// HLSL 着色器在运行时通过 D3DCompile 编译，这里只让修改着色器时触发重新构建，
/// 保证 `shader_path` 指向的文件与二进制一致。
fn main() {
    println!("cargo:rerun-if-changed=src/gfx/dx12/shaders/color.hlsl");
    println!("cargo:rerun-if-changed=src/gfx/dx12/shaders/default.hlsl");
}
