pub fn set_panic_hook() {
    // 发生 panic 时把错误信息输出到浏览器控制台
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}
