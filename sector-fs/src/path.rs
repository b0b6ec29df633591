use alloc::borrow::ToOwned;

pub trait Path: ToOwned {
    fn is_absolute(&self) -> bool;

    /// 返回路径的`(父目录, 文件名)`。
    ///
    /// 按最后一个`/`切分；父目录为根时返回`"/"`。
    /// 根路径本身与相对路径没有这样的切分，返回`None`。
    fn parent_file(&self) -> Option<(&Self, &Self)>;

    fn is_relative(&self) -> bool {
        !self.is_absolute()
    }
}

impl Path for str {
    fn is_absolute(&self) -> bool {
        self.starts_with('/')
    }

    // 路径语法不含`.`与`..`
    fn parent_file(&self) -> Option<(&Self, &Self)> {
        if self == "/" || self.is_relative() {
            return None;
        }

        self.rsplit_once('/')
            .map(|(p, f)| if p.is_empty() { ("/", f) } else { (p, f) })
    }
}
