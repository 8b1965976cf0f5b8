use tower_sessions::Session;

use crate::error::WallpaperError;

const FLASH_FLAG_KEY: &str = "flash_flag";

pub(crate) const FLASH_GENERATE_SUCCESS: u16 = 1;
pub(crate) const FLASH_GENERATE_FAILED: u16 = 2;
pub(crate) const FLASH_EMPTY_DESCRIPTION: u16 = 3;
pub(crate) const FLASH_LOGGED_OUT: u16 = 4;

#[derive(Clone, Debug)]
pub(crate) struct FlashMessage {
    pub(crate) text: &'static str,
    pub(crate) class: &'static str,
}

pub(crate) async fn set_flash(session: &Session, flag: u16) -> Result<(), WallpaperError> {
    session.insert(FLASH_FLAG_KEY, flag).await?;
    Ok(())
}

pub(crate) async fn take_flash_message(
    session: &Session,
) -> Result<Option<FlashMessage>, WallpaperError> {
    let flag = session
        .get::<u16>(FLASH_FLAG_KEY)
        .await?
        .filter(|flag| *flag != 0);
    if flag.is_some() {
        session.insert(FLASH_FLAG_KEY, 0u16).await?;
    }
    Ok(flag.and_then(message_for))
}

fn message_for(flag: u16) -> Option<FlashMessage> {
    match flag {
        FLASH_GENERATE_SUCCESS => Some(FlashMessage {
            text: "生成成功！",
            class: "success",
        }),
        FLASH_GENERATE_FAILED => Some(FlashMessage {
            text: "生成失败，请重试",
            class: "error",
        }),
        FLASH_EMPTY_DESCRIPTION => Some(FlashMessage {
            text: "图片描述不能为空",
            class: "warning",
        }),
        FLASH_LOGGED_OUT => Some(FlashMessage {
            text: "已退出登录",
            class: "success",
        }),
        _ => None,
    }
}
