// 后端接口地址

/// 分片上传
const UPLOAD_CHUNK_PATH: &str = "/api/upload-chunk/";
/// 全部上传历史
const FILE_UPLOADS_PATH: &str = "/api/file-uploads/";
/// 最近上传
const RECENT_UPLOADS_PATH: &str = "/api/recent-uploads/";

/// 后端接口地址集合
///
/// 路径中的视频ID统一做 URL 编码
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: String,
}

impl Endpoints {
    pub fn new(backend_url: &str) -> Self {
        Self {
            base: backend_url.trim_end_matches('/').to_string(),
        }
    }

    /// 后端根地址（不带结尾斜杠）
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn upload_chunk(&self) -> String {
        format!("{}{}", self.base, UPLOAD_CHUNK_PATH)
    }

    pub fn file_uploads(&self) -> String {
        format!("{}{}", self.base, FILE_UPLOADS_PATH)
    }

    pub fn recent_uploads(&self) -> String {
        format!("{}{}", self.base, RECENT_UPLOADS_PATH)
    }

    /// 播放地址（会重定向到实际的媒体地址）
    pub fn stream(&self, id: &str) -> String {
        format!("{}/api/videos/{}/stream/", self.base, urlencoding::encode(id))
    }

    pub fn download(&self, id: &str) -> String {
        format!("{}/api/videos/{}/download/", self.base, urlencoding::encode(id))
    }

    pub fn delete_video(&self, id: &str) -> String {
        format!("{}/api/delete-video/{}/", self.base, urlencoding::encode(id))
    }
}

/// 生成分享链接: `{前端地址}/video/{id}`
pub fn share_link(frontend_url: &str, id: &str) -> String {
    format!(
        "{}/video/{}",
        frontend_url.trim_end_matches('/'),
        urlencoding::encode(id)
    )
}
