fn main() {
    mini_shell::shell_main()
}
